//! Environment and discovery report

use anyhow::{Context as _, Result};
use clap::Args;
use clcontext_core::DeviceType;
use clcontext_diagnostic::Environment;
use console::style;
use serde::Serialize;
use tracing::info;

use super::Session;
use crate::output::{OutputFormat, emit};

/// Show the runtime, the diagnostic environment and discovered devices
#[derive(Debug, Args)]
pub struct InfoCommand {}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub index: usize,
    pub id: String,
    pub version: String,
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub runtime: String,
    pub backend: String,
    pub driver_profile: String,
    pub main_device_index: usize,
    pub environment: Environment,
    pub platforms: Vec<PlatformReport>,
}

impl InfoCommand {
    pub fn report(&self, session: &Session) -> Result<InfoReport> {
        let manager = &session.manager;
        let platforms = manager.platforms().context("platform discovery failed")?;
        info!(platforms = platforms.len(), "discovered platforms");

        let mut reports = Vec::with_capacity(platforms.len());
        for (index, platform) in platforms.iter().enumerate() {
            let version = manager.platform_version(*platform)?;
            let devices = manager
                .devices(*platform, DeviceType::ALL)
                .with_context(|| format!("device discovery failed on platform {platform}"))?;
            reports.push(PlatformReport {
                index,
                id: platform.to_string(),
                version,
                devices: devices.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(InfoReport {
            runtime: manager.runtime().name().to_string(),
            backend: session.config.backend.to_string(),
            driver_profile: session.config.driver_profile.to_string(),
            main_device_index: session.config.main_device_index,
            environment: session.environment()?,
            platforms: reports,
        })
    }

    pub fn run(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let report = self.report(session)?;
        emit(format, &report, print_info)
    }
}

fn print_info(report: &InfoReport) {
    println!("{}", style("clcontext environment").bold().cyan());
    println!();
    println!("{}", style("Runtime:").bold());
    println!("  Backend:        {} ({})", report.backend, report.runtime);
    println!("  Driver profile: {}", report.driver_profile);
    println!("  Main device:    #{}", report.main_device_index);
    println!();
    println!("{}", style("Diagnostic environment:").bold());
    println!("  OS:     {}", report.environment.os);
    println!("  Driver: {}", report.environment.driver);
    println!();
    println!("{}", style("Platforms:").bold());
    for platform in &report.platforms {
        println!("  [{}] {} {}", platform.index, platform.id, style(&platform.version).dim());
        for (i, device) in platform.devices.iter().enumerate() {
            let marker =
                if i == report.main_device_index { style("*").green() } else { style(" ") };
            println!("    {marker} {device}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clcontext_core::RuntimeConfig;

    #[test]
    fn test_info_lists_simulated_devices() {
        let session = Session::open(RuntimeConfig::default()).unwrap();
        let report = InfoCommand {}.report(&session).unwrap();
        assert_eq!(report.runtime, "simulated");
        assert_eq!(report.platforms.len(), 1);
        assert_eq!(report.platforms[0].devices.len(), 2);
        assert!(report.platforms[0].version.starts_with("OpenCL"));
    }
}
