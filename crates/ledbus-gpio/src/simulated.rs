//! In-memory GPIO backend.
//!
//! Records every write so tests can assert on hardware side effects. Clones
//! share state, so a test can keep one handle while the service owns another.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{Gpio, GpioError, Level};

#[derive(Debug, Default)]
struct SimState {
    ready: bool,
    fail_setup: bool,
    fail_writes: bool,
    outputs: BTreeSet<u8>,
    levels: BTreeMap<u8, Level>,
    writes: Vec<(u8, Level)>,
}

/// GPIO backend with no hardware behind it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGpio {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `setup` fails, as on a board without GPIO access.
    pub fn unavailable() -> Self {
        let gpio = Self::new();
        gpio.state().fail_setup = true;
        gpio
    }

    /// A backend whose writes fail after a successful setup.
    pub fn failing_writes() -> Self {
        let gpio = Self::new();
        gpio.state().fail_writes = true;
        gpio
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level of `pin`, if it was ever written.
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.state().levels.get(&pin).copied()
    }

    pub fn is_output(&self, pin: u8) -> bool {
        self.state().outputs.contains(&pin)
    }

    /// Every successful write, oldest first.
    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.state().writes.clone()
    }
}

impl Gpio for SimulatedGpio {
    fn name(&self) -> &str {
        "simulated"
    }

    fn setup(&self) -> Result<(), GpioError> {
        let mut st = self.state();
        if st.fail_setup {
            return Err(GpioError::Unavailable("simulated setup failure".into()));
        }
        st.ready = true;
        Ok(())
    }

    fn configure_output(&self, pin: u8) -> Result<(), GpioError> {
        let mut st = self.state();
        if !st.ready {
            return Err(GpioError::NotInitialised);
        }
        st.outputs.insert(pin);
        Ok(())
    }

    fn write(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        let mut st = self.state();
        if !st.ready {
            return Err(GpioError::NotInitialised);
        }
        if !st.outputs.contains(&pin) {
            return Err(GpioError::NotOutput(pin));
        }
        if st.fail_writes {
            return Err(GpioError::Simulated(format!("write to pin {pin}")));
        }
        debug!(pin, %level, "simulated pin write");
        st.levels.insert(pin, level);
        st.writes.push((pin, level));
        Ok(())
    }
}
