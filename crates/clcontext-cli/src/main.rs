//! clcontext CLI application
//!
//! Inspect the OpenCL runtime the context suite runs against, probe a
//! context lifecycle end to end, and check which driver quirks apply.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clcontext_cli::commands::{InfoCommand, ProbeCommand, QuirksCommand, Session};
use clcontext_cli::exit::{EXIT_CONFIG, EXIT_GENERIC_FAIL, EXIT_PROBE_FAIL, EXIT_SUCCESS};
use clcontext_cli::output::OutputFormat;
use clcontext_core::{Backend, DriverProfileKind, RuntimeConfig};
use tracing::{error, info};

/// clcontext - OpenCL context lifecycle and driver quirk toolkit
#[derive(Parser)]
#[command(name = "clcontext")]
#[command(about = "OpenCL context lifecycle and driver quirk toolkit")]
#[command(long_about = r#"
Inspect the OpenCL runtime a context suite runs against, probe the context
lifecycle (create, retain, release, introspect) and evaluate driver quirk rules.

Examples:
  # Show discovered platforms and the diagnostic environment
  clcontext info

  # Probe a GPU context as an Apple 2014 driver would answer
  clcontext --driver-profile apple-2014 probe --device-type gpu

  # Which quirks apply to createContextFromType here?
  clcontext quirks --operation create_context_from_type.zero_mask
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path (clcontext.toml)
    #[arg(short, long, value_name = "PATH", global = true, env = "CLCONTEXT_CONFIG")]
    config: Option<PathBuf>,

    /// Native backend (simulated, opencl)
    #[arg(long, value_name = "BACKEND", global = true)]
    backend: Option<Backend>,

    /// Simulated driver profile (conformant, apple-2014, amd-app-1642)
    #[arg(long, value_name = "PROFILE", global = true)]
    driver_profile: Option<DriverProfileKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Output format (text or json)
    #[arg(long, value_name = "FORMAT", global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the runtime, environment and discovered devices
    Info(InfoCommand),

    /// Create a context and exercise its lifecycle
    Probe(ProbeCommand),

    /// Evaluate quirk rules against this environment
    Quirks(QuirksCommand),
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.log_format);

    let Some(command) = cli.command.as_ref() else {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        return;
    };

    let session = match load_configuration(&cli).and_then(Session::open) {
        Ok(session) => session,
        Err(e) => {
            report_error(&e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let result = match command {
        Commands::Info(cmd) => cmd.run(&session, cli.format),
        Commands::Probe(cmd) => cmd.run(&session, cli.format),
        Commands::Quirks(cmd) => cmd.run(&session, cli.format),
    };

    if let Err(e) = &result {
        report_error(e);
    }
    std::process::exit(exit_code(command, &result));
}

/// Probe failures get their own code so scripts can tell a driver
/// divergence from a broken invocation.
fn exit_code(command: &Commands, result: &Result<()>) -> i32 {
    match (command, result) {
        (_, Ok(())) => EXIT_SUCCESS,
        (Commands::Probe(_), Err(_)) => EXIT_PROBE_FAIL,
        (_, Err(_)) => EXIT_GENERIC_FAIL,
    }
}

fn report_error(e: &anyhow::Error) {
    error!("Command failed: {}", e);
    for cause in e.chain().skip(1) {
        error!("  Caused by: {}", cause);
    }
    eprintln!("{} {e:#}", console::style("error:").red().bold());
}

/// Load configuration from file or environment, then apply CLI overrides.
fn load_configuration(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => RuntimeConfig::from_env().context("invalid CLCONTEXT_* environment")?,
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(profile) = cli.driver_profile {
        config.driver_profile = profile;
    }
    config.validate().context("invalid configuration")?;
    info!(backend = %config.backend, profile = %config.driver_profile, "configuration loaded");
    Ok(config)
}

/// Setup logging; `RUST_LOG` wins over `--log-level`.
fn setup_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_probe_with_globals() {
        let cli = Cli::try_parse_from([
            "clcontext",
            "--driver-profile",
            "amd-app-1642",
            "--format",
            "json",
            "probe",
            "--device-type",
            "gpu",
        ])
        .unwrap();
        assert_eq!(cli.driver_profile, Some(DriverProfileKind::AmdApp1642));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Some(Commands::Probe(_))));
    }

    #[test]
    fn test_exit_codes_follow_command_and_outcome() {
        let probe = Cli::try_parse_from(["clcontext", "probe"]).unwrap().command.unwrap();
        let info = Cli::try_parse_from(["clcontext", "info"]).unwrap().command.unwrap();
        let failed: Result<()> = Err(anyhow::anyhow!("boom"));

        assert_eq!(exit_code(&probe, &Ok(())), EXIT_SUCCESS);
        assert_eq!(exit_code(&probe, &failed), EXIT_PROBE_FAIL);
        assert_eq!(exit_code(&info, &failed), EXIT_GENERIC_FAIL);
    }

    #[test]
    fn test_parse_rejects_unknown_profile() {
        assert!(Cli::try_parse_from(["clcontext", "--driver-profile", "nvidia", "info"]).is_err());
    }
}
