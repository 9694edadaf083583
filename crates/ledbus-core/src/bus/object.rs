//! Bus objects: method handlers reachable at an object path.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::interface::InterfaceDescription;
use super::listener::SessionId;
use super::msg::MsgArg;
use super::status::{BusError, BusResult};
use crate::BoxFuture;

/// An incoming method invocation as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub session_id: SessionId,
    /// Unique name of the caller.
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<MsgArg>,
}

impl MethodCall {
    pub fn arg(&self, index: usize) -> Option<&MsgArg> {
        self.args.get(index)
    }
}

/// Handler for one interface member. Returns the reply arguments.
pub type MethodHandler =
    Arc<dyn Fn(MethodCall) -> BoxFuture<'static, BusResult<Vec<MsgArg>>> + Send + Sync>;

/// Wrap an async closure as a [`MethodHandler`].
pub fn method_handler<F, Fut>(f: F) -> MethodHandler
where
    F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BusResult<Vec<MsgArg>>> + Send + 'static,
{
    Arc::new(move |call: MethodCall| -> BoxFuture<'static, BusResult<Vec<MsgArg>>> {
        Box::pin(f(call))
    })
}

/// An object that can be registered on a [`BusAttachment`](super::BusAttachment).
pub struct BusObject {
    path: String,
    interfaces: Vec<InterfaceDescription>,
    handlers: HashMap<(String, String), MethodHandler>,
}

impl BusObject {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interfaces: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Implement an interface on this object. Adding it twice is an error.
    pub fn add_interface(&mut self, intf: &InterfaceDescription) -> BusResult<()> {
        if self.interface(intf.name()).is_some() {
            return Err(BusError::InterfaceExists(intf.name().to_string()));
        }
        self.interfaces.push(intf.clone());
        Ok(())
    }

    /// Attach a handler to a member of an interface previously added.
    pub fn add_method_handler(
        &mut self,
        interface: &str,
        member: &str,
        handler: MethodHandler,
    ) -> BusResult<()> {
        let intf = self
            .interface(interface)
            .ok_or_else(|| BusError::NoSuchInterface(interface.to_string()))?;
        intf.require_member(member)?;
        self.handlers
            .insert((interface.to_string(), member.to_string()), handler);
        Ok(())
    }

    pub fn interfaces(&self) -> &[InterfaceDescription] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceDescription> {
        self.interfaces.iter().find(|i| i.name() == name)
    }

    pub(crate) fn handler(&self, interface: &str, member: &str) -> Option<MethodHandler> {
        self.handlers
            .get(&(interface.to_string(), member.to_string()))
            .cloned()
    }
}

impl fmt::Debug for BusObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusObject")
            .field("path", &self.path)
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
