//! Linux sysfs GPIO backend.
//!
//! ```text
//! <root>/export              write "<pin>" to expose a pin
//! <root>/gpio<pin>/direction "out"
//! <root>/gpio<pin>/value     "1" / "0"
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Gpio, GpioError, Level};

#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), GpioError> {
    std::fs::write(path, contents).map_err(|source| GpioError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Gpio for SysfsGpio {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn setup(&self) -> Result<(), GpioError> {
        if self.root.join("export").exists() {
            Ok(())
        } else {
            Err(GpioError::Unavailable(format!(
                "{} has no export file",
                self.root.display()
            )))
        }
    }

    fn configure_output(&self, pin: u8) -> Result<(), GpioError> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            debug!(pin, "exporting pin");
            write_file(&self.root.join("export"), &pin.to_string())?;
        }
        write_file(&dir.join("direction"), "out")
    }

    fn write(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        let value = if level.is_high() { "1" } else { "0" };
        write_file(&self.pin_dir(pin).join("value"), value)
    }
}
