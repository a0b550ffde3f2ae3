use anyhow::{Context, Result};
use spinwheel_runtime::motor::{GpioCoils, DEFAULT_COIL_LINES, DEFAULT_GPIO_CHIP};

fn main() -> Result<()> {
    let mut coils = GpioCoils::open(DEFAULT_GPIO_CHIP, DEFAULT_COIL_LINES)
        .context("Failed to open coil lines")?;

    coils.release().context("Failed to de-energize coils")?;

    println!("Coils de-energized (lines {:?}).", DEFAULT_COIL_LINES);
    Ok(())
}
