//! Fuzz target for method-call decoding.
//!
//! Run with: cargo +nightly fuzz run fuzz_call_decode
//!
//! Decodes arbitrary bytes as a `CallRequest` body, then checks the
//! arguments against the LED interface the way the endpoint does.

#![no_main]

use ledbus_core::bus::msg::check_args;
use ledbus_core::bus::transport::CallRequest;
use ledbus_core::led::led_interface;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(req) = serde_json::from_slice::<CallRequest>(data) else {
        return;
    };
    let Ok(intf) = led_interface("iot.example.led") else {
        return;
    };
    if let Some(member) = intf.member(&req.member) {
        let _ = check_args(&member.in_sig, &req.args);
    }
});
