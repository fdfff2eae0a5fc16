//! CLI command implementations

pub mod info;
pub mod probe;
pub mod quirks;

pub use info::InfoCommand;
pub use probe::ProbeCommand;
pub use quirks::QuirksCommand;

use anyhow::{Context as _, Result};
use clcontext_core::{ContextManager, PlatformId, RuntimeConfig, open_runtime};
use clcontext_diagnostic::Environment;

/// The runtime a command talks to, opened from the resolved configuration.
#[derive(Debug)]
pub struct Session {
    pub config: RuntimeConfig,
    pub manager: ContextManager,
}

impl Session {
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        let runtime = open_runtime(&config).context("failed to open the native runtime")?;
        Ok(Self { config, manager: ContextManager::new(runtime) })
    }

    /// The configured platform.
    pub fn platform(&self) -> Result<PlatformId> {
        let platforms = self.manager.platforms().context("platform discovery failed")?;
        platforms.get(self.config.platform_index).copied().with_context(|| {
            format!(
                "no platform at index {} ({} available)",
                self.config.platform_index,
                platforms.len()
            )
        })
    }

    /// Facts exclusion rules are matched against for the configured platform.
    pub fn environment(&self) -> Result<Environment> {
        let platform = self.platform()?;
        let driver =
            self.manager.platform_version(platform).context("platform version query failed")?;
        let environment = Environment::resolve(self.config.driver_os().as_deref(), driver);
        Ok(environment.with_platform(platform.raw()))
    }
}
