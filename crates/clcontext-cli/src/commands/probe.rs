//! Create a context, introspect it, and exercise retain/release

use anyhow::{Context as _, Result, ensure};
use clap::Args;
use clcontext_core::{ContextProperty, DeviceType};
use console::style;
use serde::Serialize;
use tracing::info;

use super::Session;
use crate::output::{OutputFormat, emit};

/// Create a context and report its reference count, devices and properties
#[derive(Debug, Args)]
pub struct ProbeCommand {
    /// Device classes to create the context on (all, gpu, cpu, accelerator, 0x..)
    #[arg(long, default_value = "all", value_name = "TYPE")]
    pub device_type: DeviceType,

    /// Create on the main device only instead of by type
    #[arg(long, conflicts_with = "device_type")]
    pub main_device: bool,

    /// Omit the CONTEXT_PLATFORM property
    #[arg(long)]
    pub no_properties: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub context: String,
    pub reference_count: u32,
    pub reference_count_after_retain: u32,
    pub reference_count_after_release: u32,
    pub num_devices: u32,
    pub devices: Vec<String>,
    pub properties: Vec<String>,
}

fn describe(property: &ContextProperty) -> String {
    match property {
        ContextProperty::Platform(id) => format!("CONTEXT_PLATFORM={id}"),
        ContextProperty::InteropUserSync(on) => format!("CONTEXT_INTEROP_USER_SYNC={on}"),
        ContextProperty::Other { key, value } => format!("{key:#x}={value:#x}"),
    }
}

impl ProbeCommand {
    pub fn report(&self, session: &Session) -> Result<ProbeReport> {
        let manager = &session.manager;
        let platform = session.platform()?;
        let properties = [ContextProperty::Platform(platform)];
        let properties = (!self.no_properties).then_some(&properties[..]);

        let ctx = if self.main_device {
            let devices = manager.devices(platform, DeviceType::ALL)?;
            let main = devices.get(session.config.main_device_index).copied().with_context(|| {
                format!("main device index {} out of range", session.config.main_device_index)
            })?;
            manager.create_context(properties, Some(&[main]), None)
        } else {
            manager.create_context_from_type(properties, self.device_type, None)
        }
        .context("context creation failed")?;
        info!(context = %ctx.raw(), "probing context");

        let reference_count = ctx.reference_count()?;
        let extra = manager.retain_context(&ctx)?;
        let reference_count_after_retain = ctx.reference_count()?;
        manager.release_context(extra)?;
        let reference_count_after_release = ctx.reference_count()?;

        let report = ProbeReport {
            context: ctx.raw().to_string(),
            reference_count,
            reference_count_after_retain,
            reference_count_after_release,
            num_devices: ctx.num_devices()?,
            devices: ctx.devices()?.iter().map(ToString::to_string).collect(),
            properties: ctx.properties()?.iter().map(describe).collect(),
        };
        manager.release_context(ctx)?;

        ensure!(
            report.reference_count == 1,
            "new context reports reference count {}",
            report.reference_count
        );
        ensure!(
            report.reference_count_after_retain == report.reference_count + 1
                && report.reference_count_after_release == report.reference_count,
            "retain/release did not round-trip the reference count"
        );
        Ok(report)
    }

    pub fn run(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let report = self.report(session)?;
        emit(format, &report, print_probe)
    }
}

fn print_probe(report: &ProbeReport) {
    println!("{} {}", style("Context").bold(), report.context);
    println!(
        "  Reference count: {} (retain -> {}, release -> {}) {}",
        report.reference_count,
        report.reference_count_after_retain,
        report.reference_count_after_release,
        style("✓").green()
    );
    println!("  Devices ({}): {}", report.num_devices, report.devices.join(", "));
    if report.properties.is_empty() {
        println!("  Properties: {}", style("none").dim());
    } else {
        println!("  Properties: {}", report.properties.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clcontext_core::RuntimeConfig;

    fn probe(device_type: DeviceType, main_device: bool) -> Result<ProbeReport> {
        let session = Session::open(RuntimeConfig::default())?;
        ProbeCommand { device_type, main_device, no_properties: false }.report(&session)
    }

    #[test]
    fn test_probe_all_devices() {
        let report = probe(DeviceType::ALL, false).unwrap();
        assert_eq!(report.reference_count, 1);
        assert_eq!(report.reference_count_after_retain, 2);
        assert_eq!(report.num_devices, 2);
        assert_eq!(report.properties, vec!["CONTEXT_PLATFORM=0x1000".to_string()]);
    }

    #[test]
    fn test_probe_main_device() {
        let report = probe(DeviceType::ALL, true).unwrap();
        assert_eq!(report.num_devices, 1);
    }

    #[test]
    fn test_probe_missing_class_reports_native_message() {
        let err = probe(DeviceType::ACCELERATOR, false).unwrap_err();
        assert_eq!(err.root_cause().to_string(), "Device not found");
    }
}
