//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries. The builder starts from
//! timings short enough for tests: 10 ms polling and discovery, no settle
//! delay.

use std::path::Path;

use ledbus_config::{AppConfig, UNIX_PATH_PREFIX};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .bus_dir(tmp.path())
///     .pins(&[4])
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.bus.poll_interval_ms = 10;
        config.bus.discovery_interval_ms = 10;
        config.bus.call_timeout_ms = 2000;
        config.bus.join_timeout_ms = 2000;
        config.gpio.settle_ms = 0;
        Self { config }
    }

    pub fn bus_dir(mut self, dir: &Path) -> Self {
        self.config.bus.address = format!("{UNIX_PATH_PREFIX}{}", dir.display());
        self
    }

    pub fn session_port(mut self, port: u16) -> Self {
        self.config.bus.session_port = port;
        self
    }

    pub fn call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.bus.call_timeout_ms = ms;
        self
    }

    pub fn join_timeout_ms(mut self, ms: u64) -> Self {
        self.config.bus.join_timeout_ms = ms;
        self
    }

    pub fn pins(mut self, pins: &[u8]) -> Self {
        self.config.gpio.pins = pins.to_vec();
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.gpio.settle_ms = ms;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
