//! In-process bus runtime.
//!
//! A [`BusAttachment`] is one participant. Services register
//! [`BusObject`]s, claim and advertise well-known names and bind a session
//! port; clients discover those names, join a session and call methods
//! through a [`ProxyBusObject`].

pub mod attachment;
mod discovery;
pub mod interface;
pub mod listener;
pub mod msg;
pub mod object;
pub mod proxy;
mod registry;
pub mod status;
pub mod transport;

pub use attachment::{BusAttachment, BusOptions, SessionInfo};
pub use interface::{InterfaceBuilder, InterfaceDescription, Member};
pub use listener::{
    BusListener, NameFlags, Proximity, SessionId, SessionOpts, SessionPort, SessionPortListener,
    Traffic, TransportMask, display_owner,
};
pub use msg::MsgArg;
pub use object::{BusObject, MethodCall, MethodHandler, method_handler};
pub use proxy::ProxyBusObject;
pub use registry::Advertisement;
pub use status::{BusError, BusResult, STATUS_OK};
