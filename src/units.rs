use serde::{Deserialize, Serialize};

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Accelerometer full-scale range of the ICM-20948
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelRange {
    /// ±2g (power-on default, most sensitive)
    G2,
    G4,
    G8,
    /// ±16g
    G16,
}

impl AccelRange {
    /// Sensitivity in LSB/g
    pub const fn lsb_per_g(self) -> f64 {
        match self {
            Self::G2 => 16384.0,
            Self::G4 => 8192.0,
            Self::G8 => 4096.0,
            Self::G16 => 2048.0,
        }
    }

    /// ACCEL_FS_SEL field value (bits 2:1 of ACCEL_CONFIG)
    pub const fn fs_sel(self) -> u8 {
        match self {
            Self::G2 => 0,
            Self::G4 => 1,
            Self::G8 => 2,
            Self::G16 => 3,
        }
    }
}

impl Default for AccelRange {
    fn default() -> Self {
        Self::G2
    }
}

/// Gyroscope full-scale range of the ICM-20948
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GyroRange {
    /// ±250 °/s (power-on default)
    Dps250,
    Dps500,
    Dps1000,
    /// ±2000 °/s
    Dps2000,
}

impl GyroRange {
    /// Sensitivity in LSB/(°/s)
    pub const fn lsb_per_dps(self) -> f64 {
        match self {
            Self::Dps250 => 131.0,
            Self::Dps500 => 65.5,
            Self::Dps1000 => 32.8,
            Self::Dps2000 => 16.4,
        }
    }

    /// GYRO_FS_SEL field value (bits 2:1 of GYRO_CONFIG_1)
    pub const fn fs_sel(self) -> u8 {
        match self {
            Self::Dps250 => 0,
            Self::Dps500 => 1,
            Self::Dps1000 => 2,
            Self::Dps2000 => 3,
        }
    }
}

impl Default for GyroRange {
    fn default() -> Self {
        Self::Dps250
    }
}

/// One reading converted to physical units, before dt is attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalReading {
    /// Acceleration [x, y, z] in m/s² (gravity included)
    pub accel: [f64; 3],
    /// Angular rate [x, y, z] in rad/s
    pub gyro: [f64; 3],
}

/// Converts raw sensor codes to m/s² and rad/s.
///
/// The sensitivities are supplied at construction so the pipeline can be
/// driven by synthetic inputs independent of how the sensor is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    lsb_per_g: f64,
    lsb_per_dps: f64,
}

impl UnitConverter {
    pub fn new(lsb_per_g: f64, lsb_per_dps: f64) -> Self {
        Self {
            lsb_per_g,
            lsb_per_dps,
        }
    }

    pub fn for_ranges(accel: AccelRange, gyro: GyroRange) -> Self {
        Self::new(accel.lsb_per_g(), gyro.lsb_per_dps())
    }

    pub fn lsb_per_g(&self) -> f64 {
        self.lsb_per_g
    }

    pub fn lsb_per_dps(&self) -> f64 {
        self.lsb_per_dps
    }

    pub fn to_physical(&self, raw_accel: [i16; 3], raw_gyro: [i16; 3]) -> PhysicalReading {
        PhysicalReading {
            accel: raw_accel.map(|raw| raw as f64 / self.lsb_per_g * STANDARD_GRAVITY),
            gyro: raw_gyro.map(|raw| (raw as f64 / self.lsb_per_dps).to_radians()),
        }
    }
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::for_ranges(AccelRange::default(), GyroRange::default())
    }
}
