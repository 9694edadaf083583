//! Discovery listener: joins the service's session once its name shows up.
//!
//! The listener runs on the bus's watcher task; the main flow learns the
//! outcome through a [`watch`] channel carrying [`JoinProgress`].

use tokio::sync::watch;
use tracing::{info, warn};

use ledbus_core::BoxFuture;
use ledbus_core::bus::{
    BusAttachment, BusError, BusListener, SessionId, SessionOpts, SessionPort, TransportMask,
    display_owner,
};

/// How far the join has come, as seen from the main flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinProgress {
    /// Service not found yet.
    Pending,
    /// Service found; join request in flight.
    Joining,
    Joined(SessionId),
    Failed(BusError),
}

pub struct ClientListener {
    bus: BusAttachment,
    service_name: String,
    session_port: SessionPort,
    progress: watch::Sender<JoinProgress>,
}

impl ClientListener {
    /// Create the listener and the receiving end of its progress channel.
    pub fn new(
        bus: BusAttachment,
        service_name: impl Into<String>,
        session_port: SessionPort,
    ) -> (Self, watch::Receiver<JoinProgress>) {
        let (progress, rx) = watch::channel(JoinProgress::Pending);
        let listener = Self {
            bus,
            service_name: service_name.into(),
            session_port,
            progress,
        };
        (listener, rx)
    }

    async fn join(&self, name: &str) {
        let result = self
            .bus
            .join_session(name, self.session_port, SessionOpts::default())
            .await;
        let progress = match result {
            Ok(id) => {
                info!("Successfully joined session {id}");
                JoinProgress::Joined(id)
            }
            Err(e) => {
                warn!(error = %e, "Failed to join session");
                JoinProgress::Failed(e)
            }
        };
        self.progress.send_replace(progress);
    }
}

impl BusListener for ClientListener {
    fn found_advertised_name<'a>(
        &'a self,
        name: &'a str,
        _transport: TransportMask,
        prefix: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if name != self.service_name {
                return;
            }
            // only the first sighting starts a join
            let started = self.progress.send_if_modified(|p| {
                if *p == JoinProgress::Pending {
                    *p = JoinProgress::Joining;
                    true
                } else {
                    false
                }
            });
            if !started {
                return;
            }
            info!("Found advertised name: {name} prefix: {prefix}");
            self.join(name).await;
        })
    }

    fn name_owner_changed(
        &self,
        name: &str,
        previous_owner: Option<&str>,
        new_owner: Option<&str>,
    ) {
        if name == self.service_name && new_owner.is_some() {
            info!(
                "NameOwnerChanged: name={name}, oldOwner={}, newOwner={}",
                display_owner(previous_owner),
                display_owner(new_owner)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledbus_core::bus::BusOptions;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_other_names_are_ignored() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bus = BusAttachment::new("client-test", BusOptions::new(tmp.path()));
        let (listener, rx) = ClientListener::new(bus, "iot.example.led", 25);
        listener
            .found_advertised_name("iot.example.other", TransportMask::ANY, "iot.example")
            .await;
        assert_eq!(*rx.borrow(), JoinProgress::Pending);
    }

    #[tokio::test]
    async fn test_join_failure_is_published() {
        let tmp = tempfile::TempDir::new().unwrap();
        // never connected, so the join fails locally
        let bus = BusAttachment::new("client-test", BusOptions::new(tmp.path()));
        let (listener, rx) = ClientListener::new(bus, "iot.example.led", 25);
        listener
            .found_advertised_name("iot.example.led", TransportMask::ANY, "iot.example.led")
            .await;
        assert_eq!(*rx.borrow(), JoinProgress::Failed(BusError::NotStarted));

        // a second sighting does not retry
        listener
            .found_advertised_name("iot.example.led", TransportMask::ANY, "iot.example.led")
            .await;
        assert_eq!(*rx.borrow(), JoinProgress::Failed(BusError::NotStarted));
    }
}
