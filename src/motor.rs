use anyhow::{Context, Result as AnyResult};
use embedded_hal::digital::{OutputPin, PinState};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;

use crate::error::{Error, Result};
use crate::stepper::{CoilDriver, CoilState};

/// GPIO character device on the Raspberry Pi
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// BCM lines wired to the driver inputs, in coil-state order:
/// A1, A2, B1, B2
pub const DEFAULT_COIL_LINES: [u32; 4] = [23, 22, 17, 27];

const CONSUMER: &str = "spinwheel-coils";

/// Four output pins driving a bipolar stepper through an H-bridge
pub struct StepperCoils<P> {
    pins: [P; 4],
    last: CoilState,
}

/// Coils on Linux GPIO character-device lines
pub type GpioCoils = StepperCoils<CdevPin>;

impl GpioCoils {
    /// Request the four coil lines as outputs, initially low
    pub fn open(chip_path: &str, lines: [u32; 4]) -> AnyResult<Self> {
        let mut chip = Chip::new(chip_path)
            .context(format!("Failed to open GPIO chip: {}", chip_path))?;

        let pins = [
            output_line(&mut chip, lines[0])?,
            output_line(&mut chip, lines[1])?,
            output_line(&mut chip, lines[2])?,
            output_line(&mut chip, lines[3])?,
        ];

        tracing::info!(chip = chip_path, ?lines, "coil lines requested");
        Ok(Self::new(pins))
    }
}

fn output_line(chip: &mut Chip, line: u32) -> AnyResult<CdevPin> {
    let handle = chip
        .get_line(line)
        .context(format!("Failed to get GPIO line {}", line))?
        .request(LineRequestFlags::OUTPUT, 0, CONSUMER)
        .context(format!("Failed to request GPIO line {} as output", line))?;
    CdevPin::new(handle).map_err(|e| anyhow::anyhow!("Failed to wrap GPIO line {}: {:?}", line, e))
}

impl<P: OutputPin> StepperCoils<P> {
    pub fn new(pins: [P; 4]) -> Self {
        Self {
            pins,
            last: CoilState::OFF,
        }
    }

    /// Last state successfully written
    pub fn state(&self) -> CoilState {
        self.last
    }

    /// De-energize all four leads
    pub fn release(&mut self) -> Result<()> {
        self.set_coils(CoilState::OFF)
    }

    pub fn into_pins(self) -> [P; 4] {
        self.pins
    }
}

impl<P: OutputPin> CoilDriver for StepperCoils<P> {
    fn set_coils(&mut self, state: CoilState) -> Result<()> {
        for (i, (pin, level)) in self.pins.iter_mut().zip(state.0).enumerate() {
            pin.set_state(PinState::from(level))
                .map_err(|e| Error::Hardware(format!("coil lead {}: {:?}", i, e)))?;
        }
        self.last = state;
        Ok(())
    }
}
