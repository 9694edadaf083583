//! Interface descriptions.
//!
//! An interface is assembled with an [`InterfaceBuilder`] and frozen by
//! [`InterfaceBuilder::activate`]. The resulting [`InterfaceDescription`] has
//! no mutating methods, so an activated interface cannot change.

use std::sync::Arc;

use super::msg::validate_signature;
use super::status::{BusError, BusResult};

/// A method declared on an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    /// Input signature, e.g. `"y"`.
    pub in_sig: String,
    /// Output signature, e.g. `"s"`.
    pub out_sig: String,
    /// Comma separated argument names, inputs first.
    pub arg_names: String,
}

/// Builder for an [`InterfaceDescription`].
#[derive(Debug)]
pub struct InterfaceBuilder {
    name: String,
    members: Vec<Member>,
}

impl InterfaceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Declare a method. Fails on a duplicate name or an unsupported signature.
    pub fn add_method(
        mut self,
        name: &str,
        in_sig: &str,
        out_sig: &str,
        arg_names: &str,
    ) -> BusResult<Self> {
        validate_signature(in_sig)?;
        validate_signature(out_sig)?;
        if self.members.iter().any(|m| m.name == name) {
            return Err(BusError::Protocol(format!(
                "member {name} declared twice on {}",
                self.name
            )));
        }
        self.members.push(Member {
            name: name.to_string(),
            in_sig: in_sig.to_string(),
            out_sig: out_sig.to_string(),
            arg_names: arg_names.to_string(),
        });
        Ok(self)
    }

    /// Freeze the interface.
    pub fn activate(self) -> InterfaceDescription {
        InterfaceDescription {
            inner: Arc::new(InterfaceInner {
                name: self.name,
                members: self.members,
            }),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct InterfaceInner {
    name: String,
    members: Vec<Member>,
}

/// An activated, immutable interface. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescription {
    inner: Arc<InterfaceInner>,
}

impl InterfaceDescription {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.inner.members.iter().find(|m| m.name == name)
    }

    /// Look up a member or fail with [`BusError::NoSuchMember`].
    pub fn require_member(&self, name: &str) -> BusResult<&Member> {
        self.member(name).ok_or_else(|| BusError::NoSuchMember {
            interface: self.inner.name.clone(),
            member: name.to_string(),
        })
    }

    pub fn members(&self) -> &[Member] {
        &self.inner.members
    }
}
