//! Listener traits and session vocabulary.
//!
//! Listeners are invoked from the bus's background tasks, never from the
//! caller's control flow. Implementations must be `Send + Sync` and must not
//! block for long; `found_advertised_name` is async so a listener can join a
//! session from inside the callback.

use serde::{Deserialize, Serialize};

use crate::BoxFuture;

/// Port a service binds to accept sessions on.
pub type SessionPort = u16;

/// Identifier of an established session. Never `0`.
pub type SessionId = u32;

/// Set of transports a name is advertised / searched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportMask(pub u16);

impl TransportMask {
    pub const NONE: TransportMask = TransportMask(0x0000);
    pub const LOCAL: TransportMask = TransportMask(0x0001);
    pub const UNIX: TransportMask = TransportMask(0x0002);
    pub const ANY: TransportMask = TransportMask(0xffff);

    pub fn intersects(self, other: TransportMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for TransportMask {
    fn default() -> Self {
        TransportMask::ANY
    }
}

/// Kind of traffic carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traffic {
    Messages,
}

/// Physical proximity constraint on session peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    Any,
    Physical,
    Network,
}

/// Options negotiated when binding a port or joining a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOpts {
    pub traffic: Traffic,
    pub multipoint: bool,
    pub proximity: Proximity,
    pub transports: TransportMask,
}

impl Default for SessionOpts {
    /// Point-to-point message session on any transport.
    fn default() -> Self {
        Self {
            traffic: Traffic::Messages,
            multipoint: false,
            proximity: Proximity::Any,
            transports: TransportMask::ANY,
        }
    }
}

/// Flags for [`BusAttachment::request_name`](super::BusAttachment::request_name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameFlags {
    /// Take the name over from its current owner.
    pub replace_existing: bool,
    /// Fail instead of waiting in line when the name is taken.
    pub do_not_queue: bool,
}

/// Owner name for display, `<none>` when there is no owner.
pub fn display_owner(owner: Option<&str>) -> &str {
    owner.unwrap_or("<none>")
}

/// Bus-wide notifications.
pub trait BusListener: Send + Sync {
    /// A name matching an active discovery prefix was advertised.
    fn found_advertised_name<'a>(
        &'a self,
        name: &'a str,
        transport: TransportMask,
        prefix: &'a str,
    ) -> BoxFuture<'a, ()> {
        let _ = (name, transport, prefix);
        Box::pin(async {})
    }

    /// A previously found advertisement disappeared.
    fn lost_advertised_name(&self, name: &str, transport: TransportMask, prefix: &str) {
        let _ = (name, transport, prefix);
    }

    /// Ownership of a well-known name changed. `None` means "no owner".
    fn name_owner_changed(
        &self,
        name: &str,
        previous_owner: Option<&str>,
        new_owner: Option<&str>,
    ) {
        let _ = (name, previous_owner, new_owner);
    }
}

/// Decides which joiners a bound session port admits.
pub trait SessionPortListener: Send + Sync {
    fn accept_session_joiner(&self, port: SessionPort, joiner: &str, opts: &SessionOpts) -> bool;

    /// Called after a joiner was accepted and the session exists.
    fn session_joined(&self, port: SessionPort, id: SessionId, joiner: &str) {
        let _ = (port, id, joiner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_mask() {
        assert!(TransportMask::ANY.intersects(TransportMask::UNIX));
        assert!(TransportMask::LOCAL.intersects(TransportMask::ANY));
        assert!(!TransportMask::LOCAL.intersects(TransportMask::UNIX));
        assert!(!TransportMask::NONE.intersects(TransportMask::ANY));
    }

    #[test]
    fn test_default_session_opts() {
        let opts = SessionOpts::default();
        assert_eq!(opts.traffic, Traffic::Messages);
        assert!(!opts.multipoint);
        assert_eq!(opts.proximity, Proximity::Any);
        assert_eq!(opts.transports, TransportMask::ANY);
    }

    #[test]
    fn test_display_owner() {
        assert_eq!(display_owner(Some("svc.1")), "svc.1");
        assert_eq!(display_owner(None), "<none>");
    }

    struct Quiet;
    impl BusListener for Quiet {}

    #[tokio::test]
    async fn test_default_listener_methods_are_no_ops() {
        let l = Quiet;
        l.found_advertised_name("a.b", TransportMask::ANY, "a").await;
        l.lost_advertised_name("a.b", TransportMask::ANY, "a");
        l.name_owner_changed("a.b", None, Some(":1.1"));
    }
}
