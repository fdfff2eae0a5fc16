//! A resolved runtime, platform and main device for one test.

use std::sync::Arc;

use clcontext_core::{
    Backend, ClError, ConfigError, Context, ContextManager, ContextProperty, DeviceId, DeviceType,
    DriverProfileKind, PlatformId, RuntimeConfig, open_runtime,
};
use clcontext_diagnostic::{Diagnostic, Environment, RuleSet};
use clcontext_status::{ErrorKind, RegistryError, kind_for};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("native call failed during setup: {0}")]
    Native(#[from] ClError),
    #[error("runtime reports no platform at index {index} ({available} available)")]
    NoPlatform { index: usize, available: usize },
    #[error("main device index {index} is out of range ({available} devices)")]
    NoDevice { index: usize, available: usize },
    #[error("rule names an unknown error: {0}")]
    UnknownError(#[from] RegistryError),
}

/// Everything a context test needs before its first assertion.
#[derive(Debug)]
pub struct Fixture {
    config: RuntimeConfig,
    manager: ContextManager,
    platform: PlatformId,
    devices: Vec<DeviceId>,
    main_device: DeviceId,
    environment: Environment,
}

impl Fixture {
    /// Resolve the fixture described by `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self, FixtureError> {
        let runtime = open_runtime(&config)?;
        let manager = ContextManager::new(Arc::clone(&runtime));

        let platforms = manager.platforms()?;
        let platform = *platforms.get(config.platform_index).ok_or(FixtureError::NoPlatform {
            index: config.platform_index,
            available: platforms.len(),
        })?;

        let devices = manager.devices(platform, DeviceType::ALL)?;
        let main_device = *devices.get(config.main_device_index).ok_or(FixtureError::NoDevice {
            index: config.main_device_index,
            available: devices.len(),
        })?;

        let driver = manager.platform_version(platform)?;
        let environment = Environment::resolve(config.driver_os().as_deref(), driver)
            .with_platform(platform.raw())
            .with_device(main_device.raw());
        debug!(%environment, devices = devices.len(), "fixture ready");

        Ok(Self { config, manager, platform, devices, main_device, environment })
    }

    /// Defaults plus `CLCONTEXT_*` overrides.
    pub fn from_env() -> Result<Self, FixtureError> {
        Self::new(RuntimeConfig::from_env()?)
    }

    /// A simulated runtime with `profile`; other settings from the environment.
    pub fn simulated(profile: DriverProfileKind) -> Result<Self, FixtureError> {
        let mut config = RuntimeConfig::from_env()?;
        config.backend = Backend::Simulated;
        config.driver_profile = profile;
        config.validate()?;
        Self::new(config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn platform(&self) -> PlatformId {
        self.platform
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn main_device(&self) -> DeviceId {
        self.main_device
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// A fresh exclusion session over this fixture's environment.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.environment.clone())
    }

    /// `[CONTEXT_PLATFORM, platform]`.
    pub fn platform_properties(&self) -> [ContextProperty; 1] {
        [ContextProperty::Platform(self.platform)]
    }

    /// Run `f` on a context over every device of the platform, then release it.
    pub fn with_context<R>(&self, f: impl FnOnce(&Context) -> R) -> Result<R, ClError> {
        let properties = self.platform_properties();
        let context =
            self.manager.create_context_from_type(Some(&properties), DeviceType::ALL, None)?;
        let out = f(&context);
        self.manager.release_context(context)?;
        Ok(out)
    }

    /// The error `operation` must fail with here, per the first matching rule.
    pub fn expected_error(
        &self,
        rules: &RuleSet,
        operation: &str,
        default: ErrorKind,
    ) -> Result<ErrorKind, FixtureError> {
        match rules.first_match(&self.environment, operation).and_then(|r| r.expect.as_deref()) {
            Some(name) => Ok(kind_for(name)?),
            None => Ok(default),
        }
    }
}
