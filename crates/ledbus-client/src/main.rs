#![deny(unsafe_code)]

//! `led-client` — switch one LED pin through the LED service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledbus_client::{LedRequest, run_client};
use ledbus_config::AppConfig;
use ledbus_core::{Interrupt, build_info};

/// LED client.
#[derive(Parser)]
#[command(name = "led-client", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "ledbus.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// GPIO pin to switch.
    pin: u8,

    /// `0` switches the pin off; anything else switches it on.
    #[arg(allow_hyphen_values = true)]
    state: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    println!("Starting LED client");
    info!(version = %build_info::version_string(), "led-client");
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let interrupt = Interrupt::new();
    interrupt.trigger_on_ctrl_c();

    let request = LedRequest::new(cli.pin, cli.state.as_deref());
    let report = run_client(&config, request, &interrupt).await;

    if let Some(line) = report.call_line() {
        println!("{line}");
    }
    println!("LED client shutting down ({})", report.status_text());
    Ok(ExitCode::from(report.exit_code()))
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
