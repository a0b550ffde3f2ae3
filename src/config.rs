//! Runtime configuration loaded from a TOML file.
//!
//! Every field has a default, so a missing file or a partial one is fine:
//!
//! ```toml
//! [sensor]
//! address = 0x68
//! accel_range = "g4"
//! swap_xy = true
//!
//! [fusion]
//! algorithm = "complementary"
//!
//! [drive]
//! dwell_secs = 5.0
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::AudioConfig;
use crate::fusion::FusionConfig;
use crate::imu::{DEFAULT_ADDRESS, DEFAULT_I2C_DEVICE};
use crate::motor::{DEFAULT_COIL_LINES, DEFAULT_GPIO_CHIP};
use crate::stepper::DriveConfig;
use crate::trigger::DEFAULT_TRIGGER_LINE;
use crate::units::{AccelRange, GyroRange, UnitConverter};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub fusion: FusionConfig,
    pub pins: PinConfig,
    pub sampling: SamplingConfig,
    pub drive: DriveConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub i2c_device: String,
    pub address: u8,
    pub accel_range: AccelRange,
    pub gyro_range: GyroRange,
    /// Exchange x and y of the recorded motion (board mounted rotated)
    pub swap_xy: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            i2c_device: DEFAULT_I2C_DEVICE.to_string(),
            address: DEFAULT_ADDRESS,
            accel_range: AccelRange::default(),
            gyro_range: GyroRange::default(),
            swap_xy: false,
        }
    }
}

impl SensorConfig {
    pub fn converter(&self) -> UnitConverter {
        UnitConverter::for_ranges(self.accel_range, self.gyro_range)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub chip: String,
    /// Coil lines in A1, A2, B1, B2 order
    pub coils: [u32; 4],
    pub trigger: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_GPIO_CHIP.to_string(),
            coils: DEFAULT_COIL_LINES,
            trigger: DEFAULT_TRIGGER_LINE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Wait between trigger/data-ready polls
    pub poll_interval_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
        }
    }
}

impl SamplingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load configuration from `path`, or defaults when no file is there
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(path)
                .context(format!("Failed to read config file: {}", path.display()))?;
            let config = parse_config(&contents)
                .context(format!("Failed to parse config file: {}", path.display()))?;
            info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        Some(path) => {
            info!(path = %path.display(), "No config found, using defaults");
            Ok(AppConfig::default())
        }
        None => Ok(AppConfig::default()),
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}
