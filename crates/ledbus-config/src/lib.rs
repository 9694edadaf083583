#![deny(unsafe_code)]

//! Configuration loading and validation for LedBus.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! single configuration structure shared by the service and the client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bus addressing, naming and timing.
    #[serde(default)]
    pub bus: BusConfig,

    /// GPIO collaborator configuration (service side).
    #[serde(default)]
    pub gpio: GpioConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bus configuration.
///
/// `service_name` doubles as the remote interface name: the service
/// advertises the same string it declares its interface under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus address, `unix:path=<rendezvous directory>`.
    #[serde(default = "default_bus_address")]
    pub address: String,

    /// Application name each attachment registers under.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Well-known service name, also used as the interface name.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Object path the LED controller is served at.
    #[serde(default = "default_object_path")]
    pub object_path: String,

    /// Session port the service binds and the client joins.
    #[serde(default = "default_session_port")]
    pub session_port: u16,

    /// Granularity of the interrupt / join-completion wait loops.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the discovery watcher rescans advertisements.
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,

    /// Timeout for a single remote method call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Timeout for a session join request, and for the leave notice sent
    /// on teardown.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: default_bus_address(),
            app_name: default_app_name(),
            service_name: default_service_name(),
            object_path: default_object_path(),
            session_port: default_session_port(),
            poll_interval_ms: default_poll_interval_ms(),
            discovery_interval_ms: default_discovery_interval_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

/// Prefix every bus address must carry.
pub const UNIX_PATH_PREFIX: &str = "unix:path=";

impl BusConfig {
    /// The rendezvous directory named by [`BusConfig::address`].
    pub fn bus_directory(&self) -> Result<PathBuf, ConfigError> {
        match self.address.strip_prefix(UNIX_PATH_PREFIX) {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => Err(ConfigError::Validation(format!(
                "bus.address must look like \"{UNIX_PATH_PREFIX}<dir>\", got {:?}",
                self.address
            ))),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn default_bus_address() -> String {
    format!("{UNIX_PATH_PREFIX}/tmp/ledbus")
}

fn default_app_name() -> String {
    "ledController".to_string()
}

fn default_service_name() -> String {
    "iot.example.led".to_string()
}

fn default_object_path() -> String {
    "/led".to_string()
}

fn default_session_port() -> u16 {
    25
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_discovery_interval_ms() -> u64 {
    100
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_join_timeout_ms() -> u64 {
    5000
}

/// GPIO collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    /// Backend: "simulated" (in-memory) or "sysfs" (Linux `/sys/class/gpio`).
    #[serde(default = "default_gpio_backend")]
    pub backend: String,

    /// Root of the sysfs GPIO tree (sysfs backend only).
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,

    /// Pins the service drives. Calls naming any other pin are acknowledged
    /// and ignored.
    #[serde(default = "default_gpio_pins")]
    pub pins: Vec<u8>,

    /// Delay after every pin write, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: default_gpio_backend(),
            sysfs_root: default_sysfs_root(),
            pins: default_gpio_pins(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl GpioConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_gpio_backend() -> String {
    "simulated".to_string()
}

fn default_sysfs_root() -> String {
    "/sys/class/gpio".to_string()
}

fn default_gpio_pins() -> Vec<u8> {
    vec![4, 5, 6]
}

fn default_settle_ms() -> u64 {
    100
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Whether `name` is a dotted bus name such as `iot.example.led`.
pub fn is_valid_bus_name(name: &str) -> bool {
    let elements: Vec<&str> = name.split('.').collect();
    if elements.len() < 2 || name.len() > 255 {
        return false;
    }
    elements.iter().all(|el| {
        let mut chars = el.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => chars
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            _ => false,
        }
    })
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bus = &self.bus;
        bus.bus_directory()?;

        if bus.app_name.is_empty() {
            return Err(ConfigError::Validation(
                "bus.app_name must not be empty".to_string(),
            ));
        }
        if !is_valid_bus_name(&bus.service_name) {
            return Err(ConfigError::Validation(format!(
                "bus.service_name must be a dotted bus name, got {:?}",
                bus.service_name
            )));
        }
        if !bus.object_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "bus.object_path must start with '/', got {:?}",
                bus.object_path
            )));
        }
        if bus.session_port == 0 {
            return Err(ConfigError::Validation(
                "bus.session_port must be non-zero".to_string(),
            ));
        }
        if bus.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "bus.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if bus.discovery_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "bus.discovery_interval_ms must be non-zero".to_string(),
            ));
        }
        if bus.call_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "bus.call_timeout_ms must be non-zero".to_string(),
            ));
        }
        if bus.join_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "bus.join_timeout_ms must be non-zero".to_string(),
            ));
        }

        let valid_backends = ["simulated", "sysfs"];
        if !valid_backends.contains(&self.gpio.backend.as_str()) {
            return Err(ConfigError::Validation(format!(
                "gpio.backend must be one of {:?}, got {:?}",
                valid_backends, self.gpio.backend
            )));
        }
        if self.gpio.pins.is_empty() {
            return Err(ConfigError::Validation(
                "gpio.pins must list at least one pin".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for pin in &self.gpio.pins {
            if !seen.insert(*pin) {
                return Err(ConfigError::Validation(format!(
                    "gpio.pins lists pin {pin} more than once"
                )));
            }
        }

        Ok(())
    }
}
