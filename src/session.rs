use crate::error::{Error, Result};
use crate::fusion::{FusionConfig, OrientationFilter, Quaternion};
use crate::linear::{extract, gravity_vector};
use crate::units::{UnitConverter, STANDARD_GRAVITY};

/// One instant of physical-unit motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Acceleration [x, y, z] in m/s²
    pub accel: [f64; 3],
    /// Angular rate [x, y, z] in rad/s
    pub gyro: [f64; 3],
    /// Seconds since the previous sample (> 0)
    pub dt: f64,
}

/// Sensor frame axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-axis sequences recorded during one trigger window.
///
/// All six sequences always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    linear: [Vec<f64>; 3],
    angular: [Vec<f64>; 3],
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from complete sequences. Fails if lengths differ.
    pub fn from_sequences(linear: [Vec<f64>; 3], angular: [Vec<f64>; 3]) -> Option<Self> {
        let len = linear[0].len();
        if linear.iter().chain(angular.iter()).all(|s| s.len() == len) {
            Some(Self { linear, angular })
        } else {
            None
        }
    }

    /// Append one gravity-free acceleration and angular rate pair
    pub fn push(&mut self, linear_accel: [f64; 3], angular_rate: [f64; 3]) {
        for i in 0..3 {
            self.linear[i].push(linear_accel[i]);
            self.angular[i].push(angular_rate[i]);
        }
    }

    pub fn len(&self) -> usize {
        self.linear[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear acceleration sequence along `axis`
    pub fn linear(&self, axis: Axis) -> &[f64] {
        &self.linear[axis.index()]
    }

    /// Angular rate sequence about `axis`
    pub fn angular(&self, axis: Axis) -> &[f64] {
        &self.angular[axis.index()]
    }

    /// Final values of the six sequences in the order
    /// [linear x, y, z, angular x, y, z]
    pub fn last_values(&self) -> Result<[f64; 6]> {
        let mut last = [0.0; 6];
        for i in 0..3 {
            last[i] = *self.linear[i].last().ok_or(Error::EmptySession)?;
            last[i + 3] = *self.angular[i].last().ok_or(Error::EmptySession)?;
        }
        Ok(last)
    }
}

/// Accumulates fused, gravity-free samples for one trigger window.
///
/// Constructed when the trigger asserts and consumed by [`finish`] when it
/// deasserts; the filter starts at identity for every session.
///
/// [`finish`]: SessionRecorder::finish
pub struct SessionRecorder {
    converter: UnitConverter,
    filter: Box<dyn OrientationFilter + Send>,
    swap_xy: bool,
    session: Session,
    rejected: usize,
}

impl SessionRecorder {
    pub fn new(converter: UnitConverter, fusion: &FusionConfig, swap_xy: bool) -> Self {
        Self::with_filter(converter, fusion.build(), swap_xy)
    }

    pub fn with_filter(
        converter: UnitConverter,
        mut filter: Box<dyn OrientationFilter + Send>,
        swap_xy: bool,
    ) -> Self {
        filter.reset();
        Self {
            converter,
            filter,
            swap_xy,
            session: Session::new(),
            rejected: 0,
        }
    }

    /// Convert and record one raw reading taken `dt` seconds after the previous one
    pub fn record(&mut self, raw_accel: [i16; 3], raw_gyro: [i16; 3], dt: f64) -> Result<Sample> {
        let reading = self.converter.to_physical(raw_accel, raw_gyro);
        let sample = Sample {
            accel: reading.accel,
            gyro: reading.gyro,
            dt,
        };
        self.record_sample(sample)?;
        Ok(sample)
    }

    /// Fuse and append an already-converted sample.
    ///
    /// Non-finite values are rejected before they reach the filter.
    pub fn record_sample(&mut self, sample: Sample) -> Result<()> {
        if let Err(e) = validate(&sample) {
            self.rejected += 1;
            return Err(e);
        }

        let accel_unit = sample.accel.map(|a| a / STANDARD_GRAVITY);
        let q = self.filter.update(sample.gyro, accel_unit, sample.dt);
        let mut linear = extract(sample.accel, gravity_vector(&q));
        let mut angular = sample.gyro;

        if self.swap_xy {
            linear.swap(0, 1);
            angular.swap(0, 1);
        }

        self.session.push(linear, angular);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_empty()
    }

    /// Samples rejected as invalid so far
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn orientation(&self) -> Quaternion {
        self.filter.orientation()
    }

    /// Seal the window and hand the recorded sequences over
    pub fn finish(self) -> Session {
        self.session
    }

    /// Drop the in-progress session without classifying it
    pub fn discard(self) {
        tracing::debug!(samples = self.session.len(), "session discarded");
    }
}

fn validate(sample: &Sample) -> Result<()> {
    const AXES: [&str; 6] = ["accel x", "accel y", "accel z", "gyro x", "gyro y", "gyro z"];

    let values = sample.accel.iter().chain(sample.gyro.iter());
    for (&axis, &value) in AXES.iter().zip(values) {
        if !value.is_finite() {
            return Err(Error::InvalidSensorReading { axis, value });
        }
    }
    Ok(())
}
