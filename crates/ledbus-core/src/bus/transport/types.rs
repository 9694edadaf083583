//! Request/response bodies exchanged between endpoints.

use serde::{Deserialize, Serialize};

use crate::bus::listener::{SessionId, SessionOpts, SessionPort};
use crate::bus::msg::MsgArg;
use crate::bus::status::BusError;

/// Liveness probe reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub unique_name: String,
    pub version: String,
}

/// Ask the endpoint's owner to admit `joiner` on `port`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub joiner: String,
    pub port: SessionPort,
    pub opts: SessionOpts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub session_id: SessionId,
}

/// Tell the host that `leaver` is done with a session it joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub session_id: SessionId,
    pub leaver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    /// `false` when the host had no such session for `leaver`.
    pub left: bool,
}

/// A method invocation within an established session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub session_id: SessionId,
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<MsgArg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    pub args: Vec<MsgArg>,
}

/// Error body carrying the exact bus status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u8,
    pub error: BusError,
}

impl From<BusError> for ErrorResponse {
    fn from(error: BusError) -> Self {
        Self {
            code: error.code(),
            error,
        }
    }
}
