//! Bus status codes.
//!
//! Every bus operation returns [`BusResult`]. Each [`BusError`] variant has a
//! stable numeric [`code`](BusError::code) that the binaries use as their
//! process exit status; `0` is reserved for success. Errors are
//! serializable so an endpoint can hand the exact status back to the caller.

use serde::{Deserialize, Serialize};

pub type BusResult<T> = Result<T, BusError>;

/// Exit status for a successful run.
pub const STATUS_OK: u8 = 0;

/// Errors produced by the bus runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BusError {
    #[error("bus attachment not started")]
    NotStarted,

    #[error("bus attachment already started")]
    AlreadyStarted,

    #[error("bus attachment not connected")]
    NotConnected,

    #[error("bus attachment already connected")]
    AlreadyConnected,

    #[error("interface {0} already exists")]
    InterfaceExists(String),

    #[error("no such interface: {0}")]
    NoSuchInterface(String),

    #[error("interface {interface} has no member {member}")]
    NoSuchMember { interface: String, member: String },

    #[error("an object is already registered at {0}")]
    ObjectExists(String),

    #[error("no object at path {0}")]
    NoSuchObject(String),

    #[error("signature mismatch: expected \"{expected}\", got \"{actual}\"")]
    SignatureMismatch { expected: String, actual: String },

    #[error("invalid bus name: {0}")]
    InvalidBusName(String),

    #[error("name {0} is already owned")]
    NameExists(String),

    #[error("session port {0} is already bound")]
    PortAlreadyBound(u16),

    #[error("join rejected by {0}")]
    JoinSessionRejected(String),

    #[error("no session on port {0}")]
    JoinSessionNoSession(u16),

    #[error("join session failed to complete")]
    JoinSessionFailed,

    #[error("no such session: {0}")]
    NoSession(u32),

    #[error("no owner for bus name {0}")]
    UnknownPeer(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("method call timed out after {0} ms")]
    Timeout(u64),

    #[error("method handler failed: {0}")]
    MethodFailed(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BusError {
    /// Numeric status code, never `0`.
    pub fn code(&self) -> u8 {
        match self {
            BusError::NotStarted => 1,
            BusError::AlreadyStarted => 2,
            BusError::NotConnected => 3,
            BusError::AlreadyConnected => 4,
            BusError::InterfaceExists(_) => 5,
            BusError::NoSuchInterface(_) => 6,
            BusError::NoSuchMember { .. } => 7,
            BusError::ObjectExists(_) => 8,
            BusError::NoSuchObject(_) => 9,
            BusError::SignatureMismatch { .. } => 10,
            BusError::InvalidBusName(_) => 11,
            BusError::NameExists(_) => 12,
            BusError::PortAlreadyBound(_) => 13,
            BusError::JoinSessionRejected(_) => 14,
            BusError::JoinSessionNoSession(_) => 15,
            BusError::JoinSessionFailed => 16,
            BusError::NoSession(_) => 17,
            BusError::UnknownPeer(_) => 18,
            BusError::Transport(_) => 19,
            BusError::Timeout(_) => 20,
            BusError::MethodFailed(_) => 21,
            BusError::Io(_) => 22,
            BusError::Protocol(_) => 23,
        }
    }
}

impl From<std::io::Error> for BusError {
    fn from(e: std::io::Error) -> Self {
        BusError::Io(e.to_string())
    }
}
