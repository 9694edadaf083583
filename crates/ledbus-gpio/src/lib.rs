#![deny(unsafe_code)]

//! GPIO collaborator used by the LED service.
//!
//! The service only ever needs three operations: one-time hardware setup,
//! switching a pin to output, and driving an output HIGH or LOW. [`Gpio`]
//! abstracts over where those land:
//!
//! - [`SimulatedGpio`] keeps pin state in memory (default, and what tests use)
//! - [`SysfsGpio`] drives the Linux `/sys/class/gpio` interface
//!
//! All operations are synchronous; callers insert their own settle delay.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ledbus_config::GpioConfig;

mod simulated;
mod sysfs;

pub use simulated::SimulatedGpio;
pub use sysfs::SysfsGpio;

/// Output level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on { Level::High } else { Level::Low }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// Errors from the GPIO collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("GPIO hardware unavailable: {0}")]
    Unavailable(String),

    #[error("GPIO used before setup")]
    NotInitialised,

    #[error("pin {0} is not configured as an output")]
    NotOutput(u8),

    #[error("GPIO I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown GPIO backend: {0}")]
    UnknownBackend(String),

    #[error("simulated GPIO failure: {0}")]
    Simulated(String),
}

/// Pin control as seen by the LED service.
pub trait Gpio: Send + Sync {
    /// Backend name, e.g. "simulated" or "sysfs".
    fn name(&self) -> &str;

    /// One-time hardware initialisation.
    fn setup(&self) -> Result<(), GpioError>;

    fn configure_output(&self, pin: u8) -> Result<(), GpioError>;

    fn write(&self, pin: u8, level: Level) -> Result<(), GpioError>;
}

/// Build the backend named by `config.backend`.
pub fn select_backend(config: &GpioConfig) -> Result<Arc<dyn Gpio>, GpioError> {
    match config.backend.as_str() {
        "simulated" => Ok(Arc::new(SimulatedGpio::new())),
        "sysfs" => Ok(Arc::new(SysfsGpio::new(&config.sysfs_root))),
        other => Err(GpioError::UnknownBackend(other.to_string())),
    }
}
