use anyhow::{Context, Result as AnyResult};
use embedded_hal::digital::InputPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;

use crate::error::{Error, Result};

/// BCM line of the record switch
pub const DEFAULT_TRIGGER_LINE: u32 = 24;

/// The operator switch that bounds a recording window
pub trait TriggerInput {
    /// True while recording should happen
    fn is_asserted(&mut self) -> Result<bool>;
}

/// Active-high trigger on a single input pin
pub struct PinTrigger<P> {
    pin: P,
}

pub type GpioTrigger = PinTrigger<CdevPin>;

impl GpioTrigger {
    pub fn open(chip_path: &str, line: u32) -> AnyResult<Self> {
        let mut chip = Chip::new(chip_path)
            .context(format!("Failed to open GPIO chip: {}", chip_path))?;
        let handle = chip
            .get_line(line)
            .context(format!("Failed to get GPIO line {}", line))?
            .request(LineRequestFlags::INPUT, 0, "spinwheel-trigger")
            .context(format!("Failed to request GPIO line {} as input", line))?;
        let pin = CdevPin::new(handle)
            .map_err(|e| anyhow::anyhow!("Failed to wrap GPIO line {}: {:?}", line, e))?;

        tracing::info!(chip = chip_path, line, "trigger line requested");
        Ok(Self::new(pin))
    }
}

impl<P: InputPin> PinTrigger<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> TriggerInput for PinTrigger<P> {
    fn is_asserted(&mut self) -> Result<bool> {
        self.pin
            .is_high()
            .map_err(|e| Error::Hardware(format!("trigger read: {:?}", e)))
    }
}
