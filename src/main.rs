use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use spinwheel_runtime::audio::{CuePlayer, ProcessCuePlayer, SilentCuePlayer};
use spinwheel_runtime::config::{load_config, AppConfig};
use spinwheel_runtime::imu::ImuController;
use spinwheel_runtime::motor::GpioCoils;
use spinwheel_runtime::trigger::GpioTrigger;
use spinwheel_runtime::{SpinRuntime, SystemClock};

/// Spin-the-wheel runtime
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "spinwheel.toml")]
    config: PathBuf,

    /// I2C device of the ICM-20948 (overrides the config file)
    #[arg(long)]
    i2c_device: Option<String>,

    /// I2C address of the ICM-20948, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_address)]
    address: Option<u8>,

    /// GPIO character device for coils and trigger
    #[arg(long)]
    gpio_chip: Option<String>,

    /// Log cues instead of playing them
    #[arg(long)]
    no_audio: bool,

    /// Madgwick filter gain
    #[arg(long)]
    beta: Option<f64>,
}

fn parse_address(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{}': {}", s, e))
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref device) = self.i2c_device {
            config.sensor.i2c_device = device.clone();
        }
        if let Some(address) = self.address {
            config.sensor.address = address;
        }
        if let Some(ref chip) = self.gpio_chip {
            config.pins.chip = chip.clone();
        }
        if self.no_audio {
            config.audio.enabled = false;
        }
        if let Some(beta) = self.beta {
            config.fusion.beta = beta;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spinwheel_runtime=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config(Some(&args.config))?;
    args.apply(&mut config);

    info!("Initializing spinwheel runtime...");

    let imu = ImuController::new(
        &config.sensor.i2c_device,
        config.sensor.address,
        config.sensor.accel_range,
        config.sensor.gyro_range,
    )
    .context("Failed to initialize IMU")?;

    let mut coils = GpioCoils::open(&config.pins.chip, config.pins.coils)
        .context("Failed to initialize stepper coils")?;
    coils.release().context("Failed to de-energize coils")?;

    let trigger = GpioTrigger::open(&config.pins.chip, config.pins.trigger)
        .context("Failed to initialize trigger input")?;

    let player: Box<dyn CuePlayer> = if config.audio.enabled {
        Box::new(ProcessCuePlayer::new(&config.audio).context("Failed to set up audio player")?)
    } else {
        info!("Audio disabled");
        Box::new(SilentCuePlayer)
    };

    let abort = Arc::new(AtomicBool::new(false));
    let abort_clone = abort.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down...");
        abort_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut runtime = SpinRuntime::new(
        imu,
        trigger,
        coils,
        player,
        SystemClock::new(),
        &config,
        abort,
    )
    .context("Invalid drive configuration")?;

    runtime.run()?;

    info!("Runtime shutdown complete");
    Ok(())
}
