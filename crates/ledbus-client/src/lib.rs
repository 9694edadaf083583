#![deny(unsafe_code)]

//! LED client.
//!
//! Finds the LED service on the bus, joins its session and switches one pin
//! with a single synchronous call.

/// Discover, join, call, tear down.
pub mod client;
/// Discovery listener and join progress channel.
pub mod listener;
/// Client state machine.
pub mod state;

pub use client::{ClientError, ClientReport, LedRequest, run_client};
pub use listener::{ClientListener, JoinProgress};
pub use state::{ClientState, ClientStateMachine, IllegalTransition};
