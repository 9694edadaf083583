//! Typed message arguments.
//!
//! Arguments carry D-Bus style type letters so that calls can be checked
//! against the signatures an interface declares.

use serde::{Deserialize, Serialize};

use super::status::{BusError, BusResult};

/// A single argument value in a method call or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum MsgArg {
    #[serde(rename = "y")]
    Byte(u8),
    #[serde(rename = "b")]
    Bool(bool),
    #[serde(rename = "i")]
    Int32(i32),
    #[serde(rename = "u")]
    Uint32(u32),
    #[serde(rename = "s")]
    Str(String),
}

impl MsgArg {
    /// The type letter of this argument.
    pub fn signature(&self) -> char {
        match self {
            MsgArg::Byte(_) => 'y',
            MsgArg::Bool(_) => 'b',
            MsgArg::Int32(_) => 'i',
            MsgArg::Uint32(_) => 'u',
            MsgArg::Str(_) => 's',
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            MsgArg::Byte(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MsgArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<u8> for MsgArg {
    fn from(v: u8) -> Self {
        MsgArg::Byte(v)
    }
}

impl From<&str> for MsgArg {
    fn from(v: &str) -> Self {
        MsgArg::Str(v.to_string())
    }
}

impl From<String> for MsgArg {
    fn from(v: String) -> Self {
        MsgArg::Str(v)
    }
}

/// Concatenated signature of an argument list, e.g. `"ys"`.
pub fn signature_of(args: &[MsgArg]) -> String {
    args.iter().map(MsgArg::signature).collect()
}

/// Check that a signature string only uses supported type letters.
pub fn validate_signature(sig: &str) -> BusResult<()> {
    match sig.chars().find(|c| !matches!(c, 'y' | 'b' | 'i' | 'u' | 's')) {
        None => Ok(()),
        Some(c) => Err(BusError::Protocol(format!(
            "unsupported type letter {c:?} in signature {sig:?}"
        ))),
    }
}

/// Fail with [`BusError::SignatureMismatch`] unless `args` match `expected`.
pub fn check_args(expected: &str, args: &[MsgArg]) -> BusResult<()> {
    let actual = signature_of(args);
    if actual == expected {
        Ok(())
    } else {
        Err(BusError::SignatureMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
