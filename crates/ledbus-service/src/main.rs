#![deny(unsafe_code)]

//! `led-service` — serves GPIO pins over the LedBus until Ctrl-C.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledbus_config::AppConfig;
use ledbus_core::{Interrupt, build_info};
use ledbus_service::{exit_code, run_service, status_text};

/// LED controller service.
#[derive(Parser)]
#[command(name = "led-service", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "ledbus.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    println!("Starting LED controller service");
    info!(version = %build_info::version_string(), "led-service");
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let interrupt = Interrupt::new();
    interrupt.trigger_on_ctrl_c();

    let gpio = ledbus_gpio::select_backend(&config.gpio).context("selecting GPIO backend")?;
    let result = run_service(&config, gpio, &interrupt).await;

    println!("LED service shutting down ({})", status_text(&result));
    Ok(ExitCode::from(exit_code(&result)))
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
