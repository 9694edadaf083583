//! Bus and session-port listener for the LED service.

use tracing::{debug, info, warn};

use ledbus_core::bus::{
    BusListener, SessionId, SessionOpts, SessionPort, SessionPortListener, display_owner,
};

/// Admits joiners on the service port and reports changes to the owner of
/// the service name.
#[derive(Debug, Clone)]
pub struct LedServiceListener {
    service_name: String,
    session_port: SessionPort,
}

impl LedServiceListener {
    pub fn new(service_name: impl Into<String>, session_port: SessionPort) -> Self {
        Self {
            service_name: service_name.into(),
            session_port,
        }
    }
}

impl BusListener for LedServiceListener {
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

impl SessionPortListener for LedServiceListener {
    fn accept_session_joiner(&self, port: SessionPort, joiner: &str, _opts: &SessionOpts) -> bool {
        if port != self.session_port {
            warn!(joiner, "Rejecting join attempt on unexpected session port {port}");
            return false;
        }
        info!("Accepting join request from {joiner}");
        true
    }

    fn session_joined(&self, port: SessionPort, id: SessionId, joiner: &str) {
        debug!(port, session_id = id, joiner, "session joined");
    }
}
