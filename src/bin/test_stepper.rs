use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use spinwheel_runtime::motor::{GpioCoils, DEFAULT_COIL_LINES, DEFAULT_GPIO_CHIP};
use spinwheel_runtime::stepper::{DriveConfig, StepperSequencer};
use spinwheel_runtime::{Category, Direction, SystemClock};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Spin {
    Cw,
    Ccw,
}

/// Spin the wheel to a category without recording a session
#[derive(Parser, Debug)]
struct Args {
    /// Category index 0-7 (0 = environmental)
    #[arg(short, long, default_value_t = 0)]
    category: usize,

    #[arg(short, long, value_enum, default_value_t = Spin::Cw)]
    direction: Spin,

    /// Full turns before stopping
    #[arg(short, long, default_value_t = 2)]
    rotations: i64,

    /// Speed code 3-7 (step period = code / 500 s)
    #[arg(short, long, default_value_t = 3)]
    speed: u32,

    /// Dwell between forward and return, seconds
    #[arg(long, default_value_t = 2.0)]
    dwell: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let category = Category::from_index(args.category)
        .ok_or_else(|| anyhow::anyhow!("category index {} out of range 0-7", args.category))?;
    let direction = match args.direction {
        Spin::Cw => Direction::Clockwise,
        Spin::Ccw => Direction::CounterClockwise,
    };

    let config = DriveConfig {
        dwell_secs: args.dwell,
        ..DriveConfig::default()
    };
    let sequencer = StepperSequencer::from_config(&config)?;
    let plan = sequencer.plan(
        direction,
        args.rotations,
        category,
        args.speed as f64 / config.period_divisor,
    )?;

    println!("Target: {} at {}°", category, category.stop_angle());
    println!("Forward: {} steps {}, return: {} steps", plan.forward_steps, direction, plan.return_steps);

    let mut coils = GpioCoils::open(DEFAULT_GPIO_CHIP, DEFAULT_COIL_LINES)
        .context("Failed to open coil lines")?;

    let abort = Arc::new(AtomicBool::new(false));
    let abort_clone = abort.clone();
    ctrlc::set_handler(move || {
        abort_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let result = sequencer.drive(&plan, &mut coils, &mut SystemClock::new(), &abort, |phase| {
        println!("-> {:?}", phase);
    });
    coils.release().context("Failed to de-energize coils")?;

    match result {
        Ok(()) => println!("✓ Done, {} net steps", plan.net_steps()),
        Err(e) => println!("Stopped: {}", e),
    }
    Ok(())
}
