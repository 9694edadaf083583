//! The LED controller interface shared by the service and the client.
//!
//! Both sides build the descriptor independently from the same name; the
//! name is also the service's advertised bus name.

use crate::bus::{BusResult, InterfaceBuilder, InterfaceDescription};

pub const METHOD_ON: &str = "on";
pub const METHOD_OFF: &str = "off";

/// Reply every LED method returns.
pub const ACK: &str = "ACK";

const PIN_SIGNATURE: &str = "y";
const ACK_SIGNATURE: &str = "s";
const ARG_NAMES: &str = "pinNum, ackStr";

/// Build and activate the LED interface named `name`.
pub fn led_interface(name: &str) -> BusResult<InterfaceDescription> {
    Ok(InterfaceBuilder::new(name)
        .add_method(METHOD_ON, PIN_SIGNATURE, ACK_SIGNATURE, ARG_NAMES)?
        .add_method(METHOD_OFF, PIN_SIGNATURE, ACK_SIGNATURE, ARG_NAMES)?
        .activate())
}

/// Member name for switching a pin on or off.
pub fn method_for(on: bool) -> &'static str {
    if on { METHOD_ON } else { METHOD_OFF }
}
