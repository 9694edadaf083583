#![deny(unsafe_code)]

//! LED controller service.
//!
//! Serves the LED interface on the bus: `on(pin)` / `off(pin)` drive a
//! registered GPIO pin and always answer `"ACK"`.

/// Pin registry and method handlers.
pub mod controller;
/// Session admission and name-owner logging.
pub mod listener;
/// Startup, serve and shutdown sequence.
pub mod service;

pub use controller::{LedController, PinRegistry, PinWrite};
pub use listener::LedServiceListener;
pub use service::{ServiceError, exit_code, run_service, status_text};
