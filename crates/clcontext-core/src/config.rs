//! Runtime configuration file format.
//!
//! Loads [`RuntimeConfig`] from a TOML file (`clcontext.toml`) with
//! environment variable overrides via `CLCONTEXT_*` prefixed variables.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::runtime::NativeRuntime;
use crate::simulated::{DriverProfile, DriverProfileKind, SimulatedRuntime};
use crate::types::DeviceType;

/// Which native layer backs the context API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process [`SimulatedRuntime`].
    Simulated,
    /// System OpenCL ICD loader (`opencl-runtime` feature).
    OpenCl,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "simulated"),
            Self::OpenCl => write!(f, "opencl"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" | "sim" => Ok(Self::Simulated),
            "opencl" => Ok(Self::OpenCl),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Runtime configuration loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Native layer to use.
    /// Override: `CLCONTEXT_BACKEND`
    pub backend: Backend,

    /// Driver behaviour of the simulated backend.
    /// Override: `CLCONTEXT_DRIVER_PROFILE`
    pub driver_profile: DriverProfileKind,

    /// Zero-based index of the platform tests run on.
    /// Override: `CLCONTEXT_PLATFORM_IDX`
    pub platform_index: usize,

    /// Zero-based index of the device tests treat as the main one.
    /// Override: `CLCONTEXT_MAIN_DEVICE_IDX`
    pub main_device_index: usize,

    /// Device classes of the simulated platform, in order.
    /// Override: `CLCONTEXT_SIM_DEVICES` (comma-separated, e.g. `gpu,cpu`)
    pub simulated_devices: Vec<DeviceType>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            driver_profile: DriverProfileKind::Conformant,
            platform_index: 0,
            main_device_index: 0,
            simulated_devices: vec![DeviceType::GPU, DeviceType::CPU],
        }
    }
}

/// Errors that can occur when loading, validating, or applying a [`RuntimeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
    #[error("backend '{0}' is not compiled in (enable the `opencl-runtime` feature)")]
    BackendUnavailable(Backend),
}

impl RuntimeConfig {
    /// Generate a default configuration TOML string.
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: RuntimeConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend != Backend::Simulated {
            return Ok(());
        }
        if self.simulated_devices.is_empty() {
            return Err(ConfigError::Validation("simulated_devices must not be empty".into()));
        }
        if let Some(bad) = self
            .simulated_devices
            .iter()
            .find(|class| {
                !class.is_valid()
                    || class.bits().count_ones() != 1
                    || **class == DeviceType::DEFAULT
            })
        {
            return Err(ConfigError::Validation(format!(
                "simulated device class must be a single concrete class, got {bad}"
            )));
        }
        if self.platform_index != 0 {
            return Err(ConfigError::Validation(format!(
                "the simulated backend has one platform, platform_index {} is out of range",
                self.platform_index
            )));
        }
        if self.main_device_index >= self.simulated_devices.len() {
            return Err(ConfigError::Validation(format!(
                "main_device_index {} is out of range for {} simulated devices",
                self.main_device_index,
                self.simulated_devices.len()
            )));
        }
        Ok(())
    }

    /// The OS the configured driver reports as its host. Simulated profiles
    /// carry the OS they shipped on; a system runtime reports `None` and runs
    /// as the build target.
    pub fn driver_os(&self) -> Option<String> {
        match self.backend {
            Backend::Simulated => DriverProfile::from_kind(self.driver_profile).host_os,
            Backend::OpenCl => None,
        }
    }

    /// Apply `CLCONTEXT_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CLCONTEXT_BACKEND") {
            self.backend = val.parse::<Backend>().map_err(|reason| ConfigError::EnvOverride {
                key: "CLCONTEXT_BACKEND".into(),
                value: val.clone(),
                reason,
            })?;
        }

        if let Ok(val) = std::env::var("CLCONTEXT_DRIVER_PROFILE") {
            self.driver_profile =
                val.parse::<DriverProfileKind>().map_err(|reason| ConfigError::EnvOverride {
                    key: "CLCONTEXT_DRIVER_PROFILE".into(),
                    value: val.clone(),
                    reason,
                })?;
        }

        if let Ok(val) = std::env::var("CLCONTEXT_PLATFORM_IDX") {
            self.platform_index = val.parse::<usize>().map_err(|e| ConfigError::EnvOverride {
                key: "CLCONTEXT_PLATFORM_IDX".into(),
                value: val.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Ok(val) = std::env::var("CLCONTEXT_MAIN_DEVICE_IDX") {
            self.main_device_index = val.parse::<usize>().map_err(|e| ConfigError::EnvOverride {
                key: "CLCONTEXT_MAIN_DEVICE_IDX".into(),
                value: val.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Ok(val) = std::env::var("CLCONTEXT_SIM_DEVICES") {
            self.simulated_devices = val
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse::<DeviceType>)
                .collect::<Result<_, _>>()
                .map_err(|reason| ConfigError::EnvOverride {
                    key: "CLCONTEXT_SIM_DEVICES".into(),
                    value: val.clone(),
                    reason,
                })?;
        }

        Ok(())
    }
}

/// Build the native runtime a configuration selects.
pub fn open_runtime(config: &RuntimeConfig) -> Result<Arc<dyn NativeRuntime>, ConfigError> {
    match config.backend {
        Backend::Simulated => {
            let profile = DriverProfile::from_kind(config.driver_profile);
            Ok(Arc::new(SimulatedRuntime::with_devices(profile, &config.simulated_devices)))
        }
        #[cfg(feature = "opencl-runtime")]
        Backend::OpenCl => {
            info!("using the system OpenCL runtime");
            Ok(Arc::new(crate::opencl::OpenClRuntime::new()))
        }
        #[cfg(not(feature = "opencl-runtime"))]
        Backend::OpenCl => {
            info!("OpenCL backend requested but not compiled in");
            Err(ConfigError::BackendUnavailable(Backend::OpenCl))
        }
    }
}
