#![deny(unsafe_code)]

//! Shared test utilities for the LedBus workspace.
//!
//! Provides a throwaway bus directory and a config builder so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! ledbus-test-utils = { workspace = true }
//! ```

pub mod bus;
pub mod config;

pub use bus::TestBus;
pub use config::TestConfigBuilder;
