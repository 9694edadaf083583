#![deny(unsafe_code)]

//! LedBus core runtime.
//!
//! Provides the bus attachment, session and method-call machinery shared by
//! the LED service and client, plus the cooperative interrupt flag both
//! binaries poll.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future for trait methods that must stay
/// object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Bus attachments, interfaces, objects, sessions and discovery.
pub mod bus;
/// Cooperative interrupt flag set from SIGINT.
pub mod interrupt;
/// The LED controller interface.
pub mod led;

pub use bus::{BusAttachment, BusError, BusOptions, BusResult};
pub use interrupt::Interrupt;
