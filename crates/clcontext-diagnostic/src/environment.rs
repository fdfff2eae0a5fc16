//! The environment facts exclusion rules are matched against.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the detected OS name.
pub const OS_ENV: &str = "CLCONTEXT_OS";
/// Environment variable overriding the driver string.
pub const DRIVER_ENV: &str = "CLCONTEXT_DRIVER";

/// Opaque platform or device identity, compared by value only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(usize);

impl Identity {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

impl From<usize> for Identity {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:#x})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Snapshot of the running platform, device, OS and driver.
///
/// Built once per test and never mutated by rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub platform: Option<Identity>,
    pub device: Option<Identity>,
    /// Normalised OS name (see [`normalize_os`]).
    pub os: String,
    /// The platform version string, e.g. `OpenCL 1.2 (Dec 14 2014 22:29:47)`.
    pub driver: String,
}

impl Environment {
    pub fn new(os: impl AsRef<str>, driver: impl Into<String>) -> Self {
        Self { platform: None, device: None, os: normalize_os(os.as_ref()), driver: driver.into() }
    }

    /// The build target's OS with `CLCONTEXT_OS` / `CLCONTEXT_DRIVER` applied.
    pub fn detect() -> Self {
        Self::resolve(None, String::new())
    }

    /// Environment for a runtime reporting `driver`. `driver_os` pins the OS
    /// a driver is known to run on; without it the build target's OS is used.
    /// `CLCONTEXT_OS` / `CLCONTEXT_DRIVER` win over both.
    pub fn resolve(driver_os: Option<&str>, driver: impl Into<String>) -> Self {
        let os = driver_os.unwrap_or(std::env::consts::OS);
        EnvironmentOverrides::from_env().apply(Self::new(os, driver))
    }

    pub fn with_platform(mut self, platform: impl Into<Identity>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<Identity>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os={} driver={:?}", self.os, self.driver)?;
        if let Some(platform) = self.platform {
            write!(f, " platform={platform}")?;
        }
        if let Some(device) = self.device {
            write!(f, " device={device}")?;
        }
        Ok(())
    }
}

/// Values read from `CLCONTEXT_OS` and `CLCONTEXT_DRIVER`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    pub os: Option<String>,
    pub driver: Option<String>,
}

impl EnvironmentOverrides {
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self { os: read(OS_ENV), driver: read(DRIVER_ENV) }
    }

    pub fn is_empty(&self) -> bool {
        self.os.is_none() && self.driver.is_none()
    }

    /// Replace the facts that have an override; identities are kept.
    pub fn apply(&self, mut environment: Environment) -> Environment {
        if let Some(os) = &self.os {
            debug!(os, "OS overridden from environment");
            environment.os = normalize_os(os);
        }
        if let Some(driver) = &self.driver {
            debug!(driver, "driver overridden from environment");
            environment.driver.clone_from(driver);
        }
        environment
    }
}

/// Lower-cased OS name with the macOS aliases folded onto `darwin`.
pub fn normalize_os(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "macos" | "osx" | "mac" | "macosx" => "darwin".to_owned(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn macos_aliases_fold_to_darwin() {
        for name in ["macos", "MacOS", "darwin", " Darwin ", "osx"] {
            assert_eq!(normalize_os(name), "darwin", "{name}");
        }
        assert_eq!(normalize_os("Linux"), "linux");
    }

    #[test]
    fn builder_sets_identities() {
        let env = Environment::new("linux", "OpenCL 3.0").with_platform(0x1000).with_device(0x2000);
        assert_eq!(env.platform, Some(Identity::new(0x1000)));
        assert_eq!(env.device, Some(Identity::new(0x2000)));
        assert_eq!(env.to_string(), "os=linux driver=\"OpenCL 3.0\" platform=0x1000 device=0x2000");
    }

    #[test]
    #[serial(clcontext_env)]
    fn detect_honours_overrides() {
        temp_env::with_vars(
            [(OS_ENV, Some("macos")), (DRIVER_ENV, Some("OpenCL 1.2 (Dec 14 2014 22:29:47)"))],
            || {
                let env = Environment::detect();
                assert_eq!(env.os, "darwin");
                assert_eq!(env.driver, "OpenCL 1.2 (Dec 14 2014 22:29:47)");
            },
        );
    }

    #[test]
    #[serial(clcontext_env)]
    fn blank_overrides_are_ignored() {
        temp_env::with_vars([(OS_ENV, Some("  ")), (DRIVER_ENV, None::<&str>)], || {
            let overrides = EnvironmentOverrides::from_env();
            assert!(overrides.is_empty());
            assert_eq!(Environment::detect().os, normalize_os(std::env::consts::OS));
        });
    }

    #[test]
    #[serial(clcontext_env)]
    fn resolve_prefers_driver_os_then_overrides() {
        temp_env::with_vars([(OS_ENV, None::<&str>), (DRIVER_ENV, None::<&str>)], || {
            let env = Environment::resolve(Some("darwin"), "OpenCL 1.2");
            assert_eq!(env.os, "darwin");
            assert_eq!(env.driver, "OpenCL 1.2");
            let env = Environment::resolve(None, "OpenCL 3.0");
            assert_eq!(env.os, normalize_os(std::env::consts::OS));
        });
        temp_env::with_vars([(OS_ENV, Some("windows")), (DRIVER_ENV, None::<&str>)], || {
            assert_eq!(Environment::resolve(Some("darwin"), "OpenCL 1.2").os, "windows");
        });
    }

    #[test]
    fn overrides_keep_identities() {
        let env = Environment::new("linux", "a").with_platform(1);
        let overrides = EnvironmentOverrides { os: None, driver: Some("b".into()) };
        let env = overrides.apply(env);
        assert_eq!(env.platform, Some(Identity::new(1)));
        assert_eq!(env.driver, "b");
    }
}
