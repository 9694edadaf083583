//! Client-side handle on a remote bus object.

use std::time::Duration;

use tracing::debug;

use super::attachment::BusAttachment;
use super::interface::InterfaceDescription;
use super::listener::SessionId;
use super::msg::{MsgArg, check_args};
use super::status::{BusError, BusResult};
use super::transport::CallRequest;

/// A remote object reached through a joined session.
#[derive(Debug, Clone)]
pub struct ProxyBusObject {
    bus: BusAttachment,
    service_name: String,
    path: String,
    session_id: SessionId,
    interfaces: Vec<InterfaceDescription>,
}

impl ProxyBusObject {
    pub fn new(
        bus: &BusAttachment,
        service_name: impl Into<String>,
        path: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        Self {
            bus: bus.clone(),
            service_name: service_name.into(),
            path: path.into(),
            session_id,
            interfaces: Vec::new(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Declare an interface the remote object implements.
    pub fn add_interface(&mut self, intf: &InterfaceDescription) -> BusResult<()> {
        if self.interfaces.iter().any(|i| i.name() == intf.name()) {
            return Err(BusError::InterfaceExists(intf.name().to_string()));
        }
        self.interfaces.push(intf.clone());
        Ok(())
    }

    /// Invoke `interface.member` synchronously and wait up to `timeout` for
    /// the reply. Arguments and reply are checked against the declared
    /// member signatures.
    pub async fn method_call(
        &self,
        interface: &str,
        member: &str,
        args: &[MsgArg],
        timeout: Duration,
    ) -> BusResult<Vec<MsgArg>> {
        let intf = self
            .interfaces
            .iter()
            .find(|i| i.name() == interface)
            .ok_or_else(|| BusError::NoSuchInterface(interface.to_string()))?;
        let decl = intf.require_member(member)?;
        check_args(&decl.in_sig, args)?;

        let endpoint = self.bus.endpoint_for_session(self.session_id)?;
        let request = CallRequest {
            session_id: self.session_id,
            sender: self.bus.unique_name().to_string(),
            path: self.path.clone(),
            interface: interface.to_string(),
            member: member.to_string(),
            args: args.to_vec(),
        };
        debug!(
            service = %self.service_name,
            path = %self.path,
            interface,
            member,
            "method call"
        );

        let reply = tokio::time::timeout(timeout, endpoint.call(&request))
            .await
            .map_err(|_| BusError::Timeout(timeout.as_millis() as u64))??;
        check_args(&decl.out_sig, &reply.args)?;
        Ok(reply.args)
    }
}
