//! The LED controller object: pin registry plus the `on` / `off` handlers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use ledbus_core::bus::msg::signature_of;
use ledbus_core::bus::{
    BusError, BusObject, BusResult, InterfaceDescription, MethodCall, MsgArg, method_handler,
};
use ledbus_core::led::{ACK, method_for};
use ledbus_gpio::{Gpio, GpioError, Level};

/// Pins the controller drives. Filled once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinRegistry {
    pins: BTreeSet<u8>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `pin`, returning `true` if it was not known yet.
    pub fn insert(&mut self, pin: u8) -> bool {
        self.pins.insert(pin)
    }

    pub fn contains(&self, pin: u8) -> bool {
        self.pins.contains(&pin)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.pins.iter().copied()
    }
}

/// Outcome of a pin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinWrite {
    /// The pin is registered and was driven to the level.
    Applied(Level),
    /// Unknown pin; nothing was written.
    Ignored,
    /// The pin is registered but the hardware write failed.
    Failed,
}

/// Handles LED method calls by driving GPIO pins.
pub struct LedController {
    gpio: Arc<dyn Gpio>,
    pins: PinRegistry,
    settle: Duration,
}

impl LedController {
    pub fn new(gpio: Arc<dyn Gpio>, settle: Duration) -> Self {
        Self {
            gpio,
            pins: PinRegistry::new(),
            settle,
        }
    }

    pub fn pins(&self) -> &PinRegistry {
        &self.pins
    }

    /// Register `pin`: configure it as an output, drive it HIGH and wait
    /// for it to settle. Known pins are left untouched and yield `false`.
    pub async fn register_pin(&mut self, pin: u8) -> Result<bool, GpioError> {
        if self.pins.contains(pin) {
            return Ok(false);
        }
        self.gpio.configure_output(pin)?;
        self.gpio.write(pin, Level::High)?;
        self.pins.insert(pin);
        tokio::time::sleep(self.settle).await;
        debug!(pin, "pin registered");
        Ok(true)
    }

    pub async fn register_pins(&mut self, pins: &[u8]) -> Result<(), GpioError> {
        for &pin in pins {
            self.register_pin(pin).await?;
        }
        Ok(())
    }

    /// Drive a registered pin; unknown pins are ignored.
    pub async fn set_pin(&self, pin: u8, on: bool) -> PinWrite {
        if !self.pins.contains(pin) {
            debug!(pin, "ignoring unknown pin");
            return PinWrite::Ignored;
        }
        let level = Level::from(on);
        let outcome = match self.gpio.write(pin, level) {
            Ok(()) => PinWrite::Applied(level),
            Err(e) => {
                warn!(pin, %level, error = %e, "pin write failed");
                PinWrite::Failed
            }
        };
        tokio::time::sleep(self.settle).await;
        outcome
    }

    /// Handle one `on` / `off` call. The reply is always `"ACK"`.
    pub async fn handle(&self, on: bool, call: MethodCall) -> BusResult<Vec<MsgArg>> {
        let pin = call
            .arg(0)
            .and_then(MsgArg::as_byte)
            .ok_or_else(|| BusError::SignatureMismatch {
                expected: "y".to_string(),
                actual: signature_of(&call.args),
            })?;
        info!(sender = %call.sender, "Turn {} pin {pin}", method_for(on));
        self.set_pin(pin, on).await;
        Ok(vec![MsgArg::from(ACK)])
    }

    /// Wrap the controller as a bus object serving `intf` at `path`.
    pub fn into_bus_object(
        self: Arc<Self>,
        intf: &InterfaceDescription,
        path: &str,
    ) -> BusResult<BusObject> {
        let mut object = BusObject::new(path);
        object.add_interface(intf)?;
        for on in [true, false] {
            let controller = Arc::clone(&self);
            object.add_method_handler(
                intf.name(),
                method_for(on),
                method_handler(move |call: MethodCall| {
                    let controller = Arc::clone(&controller);
                    async move { controller.handle(on, call).await }
                }),
            )?;
        }
        Ok(object)
    }
}
