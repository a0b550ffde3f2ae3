//! Orientation estimation from gyroscope and accelerometer samples.
//!
//! Two filters are provided behind [`OrientationFilter`]:
//!
//! - [`MadgwickFilter`]: gradient-descent quaternion filter (IMU variant, no
//!   magnetometer). Default.
//! - [`ComplementaryFilter`]: gyro-integrated roll/pitch blended with the
//!   accelerometer tilt at a fixed ratio.
//!
//! Both use the accelerometer only as a "down" reference, so roll and pitch
//! drift is bounded. Yaw is never corrected: without a magnetometer there is
//! no heading reference and yaw drifts without bound over long sessions.

use serde::{Deserialize, Serialize};

/// Substituted for a non-positive or non-finite sample period (seconds)
pub const MIN_SAMPLE_PERIOD: f64 = 1e-3;

/// Default Madgwick gain for IMU-only fusion
pub const DEFAULT_BETA: f64 = 0.033;

/// Default gyro weight of the complementary filter
pub const DEFAULT_BLEND: f64 = 0.98;

/// Unit quaternion, scalar-first (w, x, y, z).
///
/// Represents the sensor body frame relative to the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis` (need not be normalized)
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (s, c) = (angle / 2.0).sin_cos();
        Self::new(c, s * axis[0] / len, s * axis[1] / len, s * axis[2] / len)
    }

    /// Build from roll, pitch, yaw (radians), ZYX intrinsic order
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll / 2.0).sin_cos();
        let (sp, cp) = (pitch / 2.0).sin_cos();
        let (sy, cy) = (yaw / 2.0).sin_cos();

        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Convert to [roll, pitch, yaw] in radians, ZYX intrinsic order
    pub fn to_euler(&self) -> [f64; 3] {
        let Self { w, x, y, z } = *self;

        let sinr_cosp = 2.0 * (w * x + y * z);
        let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            std::f64::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        [roll, pitch, yaw]
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy. A degenerate quaternion collapses to identity.
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm > 0.0 && norm.is_finite() {
            self.scale(1.0 / norm)
        } else {
            Self::IDENTITY
        }
    }

    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Hamilton product: self * other
    pub fn multiply(&self, other: &Quaternion) -> Self {
        Self::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }

    /// Rotate a vector: q * v * q^*
    pub fn rotate_vector(&self, v: [f64; 3]) -> [f64; 3] {
        let rotated = self
            .multiply(&Quaternion::new(0.0, v[0], v[1], v[2]))
            .multiply(&self.conjugate());
        [rotated.x, rotated.y, rotated.z]
    }

    fn scale(&self, k: f64) -> Self {
        Self::new(self.w * k, self.x * k, self.y * k, self.z * k)
    }

    fn add(&self, other: &Quaternion) -> Self {
        Self::new(
            self.w + other.w,
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
        )
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Clamp a measured sample period to something the integrators can use.
///
/// A non-monotonic clock can produce dt <= 0; that must not reach the
/// integration as NaN/Inf.
pub fn sanitize_dt(dt: f64) -> f64 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        MIN_SAMPLE_PERIOD
    }
}

/// Stateful orientation estimator fed one sample at a time, in arrival order.
pub trait OrientationFilter {
    /// Advance the estimate by one sample.
    ///
    /// `gyro` is in rad/s, `accel_unit` is acceleration in units of g (only
    /// its direction is used), `dt` is the measured time since the previous
    /// sample in seconds.
    fn update(&mut self, gyro: [f64; 3], accel_unit: [f64; 3], dt: f64) -> Quaternion;

    /// Current orientation estimate
    fn orientation(&self) -> Quaternion;

    /// Sample period used by the most recent update
    fn sample_period(&self) -> f64;

    /// Return to the identity orientation
    fn reset(&mut self);
}

/// Which fusion algorithm the recorder runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionAlgorithm {
    Madgwick,
    Complementary,
}

impl Default for FusionAlgorithm {
    fn default() -> Self {
        Self::Madgwick
    }
}

/// Fusion filter parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub algorithm: FusionAlgorithm,
    /// Madgwick gain. Higher converges faster but passes more accelerometer noise.
    pub beta: f64,
    /// Complementary filter gyro weight in [0, 1]
    pub blend: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            algorithm: FusionAlgorithm::Madgwick,
            beta: DEFAULT_BETA,
            blend: DEFAULT_BLEND,
        }
    }
}

impl FusionConfig {
    /// Construct the configured filter, starting at identity
    pub fn build(&self) -> Box<dyn OrientationFilter + Send> {
        match self.algorithm {
            FusionAlgorithm::Madgwick => Box::new(MadgwickFilter::new(self.beta)),
            FusionAlgorithm::Complementary => Box::new(ComplementaryFilter::new(self.blend)),
        }
    }
}

/// Madgwick gradient-descent orientation filter (gyro + accelerometer).
///
/// Reference: Madgwick, S. O. H. (2010). "An efficient orientation filter
/// for inertial and inertial/magnetic sensor arrays."
#[derive(Debug, Clone)]
pub struct MadgwickFilter {
    q: Quaternion,
    beta: f64,
    sample_period: f64,
}

impl MadgwickFilter {
    pub fn new(beta: f64) -> Self {
        Self::with_orientation(beta, Quaternion::IDENTITY)
    }

    pub fn with_orientation(beta: f64, q: Quaternion) -> Self {
        Self {
            q: q.normalized(),
            beta,
            sample_period: MIN_SAMPLE_PERIOD,
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }
}

impl Default for MadgwickFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BETA)
    }
}

impl OrientationFilter for MadgwickFilter {
    fn update(&mut self, gyro: [f64; 3], accel_unit: [f64; 3], dt: f64) -> Quaternion {
        let dt = sanitize_dt(dt);
        self.sample_period = dt;

        let q = self.q;
        let [gx, gy, gz] = gyro;

        // Rate of change from the gyroscope alone
        let mut q_dot = q.multiply(&Quaternion::new(0.0, gx, gy, gz)).scale(0.5);

        let [ax, ay, az] = accel_unit;
        let a_norm = (ax * ax + ay * ay + az * az).sqrt();
        if a_norm > 0.0 && a_norm.is_finite() {
            let (ax, ay, az) = (ax / a_norm, ay / a_norm, az / a_norm);
            let Quaternion { w, x, y, z } = q;

            // Objective: estimated gravity direction minus measured direction
            let f0 = 2.0 * (x * z - w * y) - ax;
            let f1 = 2.0 * (w * x + y * z) - ay;
            let f2 = 2.0 * (0.5 - x * x - y * y) - az;

            // Gradient J^T f
            let s = Quaternion::new(
                -2.0 * y * f0 + 2.0 * x * f1,
                2.0 * z * f0 + 2.0 * w * f1 - 4.0 * x * f2,
                -2.0 * w * f0 + 2.0 * z * f1 - 4.0 * y * f2,
                2.0 * x * f0 + 2.0 * y * f1,
            );
            let s_norm = s.norm();
            if s_norm > 0.0 {
                q_dot = q_dot.add(&s.scale(-self.beta / s_norm));
            }
        }

        self.q = q.add(&q_dot.scale(dt)).normalized();
        tracing::trace!(w = self.q.w, x = self.q.x, y = self.q.y, z = self.q.z, dt, "madgwick update");
        self.q
    }

    fn orientation(&self) -> Quaternion {
        self.q
    }

    fn sample_period(&self) -> f64 {
        self.sample_period
    }

    fn reset(&mut self) {
        self.q = Quaternion::IDENTITY;
        self.sample_period = MIN_SAMPLE_PERIOD;
    }
}

/// Complementary filter over roll/pitch/yaw.
///
/// `angle = blend * (angle + rate * dt) + (1 - blend) * accel_angle` for roll
/// and pitch; yaw is pure gyro integration.
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    blend: f64,
    roll: f64,
    pitch: f64,
    yaw: f64,
    sample_period: f64,
}

impl ComplementaryFilter {
    pub fn new(blend: f64) -> Self {
        Self {
            blend: blend.clamp(0.0, 1.0),
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            sample_period: MIN_SAMPLE_PERIOD,
        }
    }

    /// Start from explicit roll/pitch/yaw (radians)
    pub fn with_angles(blend: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            ..Self::new(blend)
        }
    }

    /// [roll, pitch, yaw] in radians
    pub fn angles(&self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}

impl Default for ComplementaryFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLEND)
    }
}

impl OrientationFilter for ComplementaryFilter {
    fn update(&mut self, gyro: [f64; 3], accel_unit: [f64; 3], dt: f64) -> Quaternion {
        let dt = sanitize_dt(dt);
        self.sample_period = dt;

        let roll_gyro = self.roll + gyro[0] * dt;
        let pitch_gyro = self.pitch + gyro[1] * dt;
        self.yaw += gyro[2] * dt;

        let [ax, ay, az] = accel_unit;
        let a_norm = (ax * ax + ay * ay + az * az).sqrt();
        if a_norm > 0.0 && a_norm.is_finite() {
            let (ax, ay, az) = (ax / a_norm, ay / a_norm, az / a_norm);
            let roll_acc = ay.atan2(az);
            let pitch_acc = (-ax).atan2((ay * ay + az * az).sqrt());

            self.roll = self.blend * roll_gyro + (1.0 - self.blend) * roll_acc;
            self.pitch = self.blend * pitch_gyro + (1.0 - self.blend) * pitch_acc;
        } else {
            self.roll = roll_gyro;
            self.pitch = pitch_gyro;
        }

        self.orientation()
    }

    fn orientation(&self) -> Quaternion {
        Quaternion::from_euler(self.roll, self.pitch, self.yaw)
    }

    fn sample_period(&self) -> f64 {
        self.sample_period
    }

    fn reset(&mut self) {
        self.roll = 0.0;
        self.pitch = 0.0;
        self.yaw = 0.0;
        self.sample_period = MIN_SAMPLE_PERIOD;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::gravity_vector;

    const EPSILON: f64 = 1e-9;

    fn assert_vec_near(actual: [f64; 3], expected: [f64; 3], tol: f64) {
        for i in 0..3 {
            assert!(
                (actual[i] - expected[i]).abs() < tol,
                "component {}: got {:?}, expected {:?}",
                i,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_quaternion_identity_rotation() {
        let v = [1.0, -2.0, 3.0];
        assert_vec_near(Quaternion::IDENTITY.rotate_vector(v), v, EPSILON);
    }

    #[test]
    fn test_quaternion_rotate_about_z() {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        assert_vec_near(q.rotate_vector([1.0, 0.0, 0.0]), [0.0, 1.0, 0.0], 1e-12);
    }

    #[test]
    fn test_euler_round_trip() {
        let q = Quaternion::from_euler(0.3, -0.2, 1.1);
        let [roll, pitch, yaw] = q.to_euler();
        assert!((roll - 0.3).abs() < 1e-12);
        assert!((pitch + 0.2).abs() < 1e-12);
        assert!((yaw - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_sanitize_dt() {
        assert_eq!(sanitize_dt(0.01), 0.01);
        assert_eq!(sanitize_dt(0.0), MIN_SAMPLE_PERIOD);
        assert_eq!(sanitize_dt(-0.5), MIN_SAMPLE_PERIOD);
        assert_eq!(sanitize_dt(f64::NAN), MIN_SAMPLE_PERIOD);
        assert_eq!(sanitize_dt(f64::INFINITY), MIN_SAMPLE_PERIOD);
    }

    #[test]
    fn test_madgwick_stays_at_identity_when_level() {
        let mut filter = MadgwickFilter::default();
        for _ in 0..100 {
            filter.update([0.0; 3], [0.0, 0.0, 1.0], 0.01);
        }
        let q = filter.orientation();
        assert!((q.w - 1.0).abs() < 1e-9);
        assert_vec_near(gravity_vector(&q), [0.0, 0.0, 1.0], 1e-9);
    }

    #[test]
    fn test_madgwick_converges_from_tilted_start() {
        let start = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 60f64.to_radians());
        let mut filter = MadgwickFilter::with_orientation(DEFAULT_BETA, start);

        // Starting estimate is far from level
        assert!(gravity_vector(&filter.orientation())[2] < 0.6);

        for _ in 0..5000 {
            filter.update([0.0; 3], [0.0, 0.0, 1.0], 0.01);
        }

        assert_vec_near(gravity_vector(&filter.orientation()), [0.0, 0.0, 1.0], 1e-2);
    }

    #[test]
    fn test_madgwick_keeps_unit_norm() {
        let mut filter = MadgwickFilter::new(0.1);
        for i in 0..500 {
            let t = i as f64 * 0.01;
            let q = filter.update(
                [0.5 * t.sin(), -0.3, 1.2 * t.cos()],
                [0.1 * t.cos(), 0.05, 0.98],
                0.01,
            );
            assert!((q.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_madgwick_non_positive_dt_stays_finite() {
        let mut filter = MadgwickFilter::default();
        let q = filter.update([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], 0.0);
        assert!(q.w.is_finite() && q.x.is_finite() && q.y.is_finite() && q.z.is_finite());
        assert_eq!(filter.sample_period(), MIN_SAMPLE_PERIOD);

        let q = filter.update([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], -0.02);
        assert!((q.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_madgwick_zero_accel_integrates_gyro_only() {
        let mut filter = MadgwickFilter::default();
        // 1 rad/s about z for 1 s, no gravity reference
        for _ in 0..1000 {
            filter.update([0.0, 0.0, 1.0], [0.0; 3], 0.001);
        }
        let [_, _, yaw] = filter.orientation().to_euler();
        assert!((yaw - 1.0).abs() < 1e-2, "yaw was {}", yaw);
    }

    #[test]
    fn test_madgwick_reset() {
        let mut filter = MadgwickFilter::default();
        filter.update([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], 0.05);
        filter.reset();
        assert_eq!(filter.orientation(), Quaternion::IDENTITY);
    }

    #[test]
    fn test_complementary_converges_from_tilted_start() {
        let mut filter = ComplementaryFilter::with_angles(DEFAULT_BLEND, 1.0, -0.5, 0.0);
        for _ in 0..2000 {
            filter.update([0.0; 3], [0.0, 0.0, 1.0], 0.01);
        }
        let [roll, pitch, _] = filter.angles();
        assert!(roll.abs() < 1e-6);
        assert!(pitch.abs() < 1e-6);
        assert_vec_near(gravity_vector(&filter.orientation()), [0.0, 0.0, 1.0], 1e-6);
    }

    #[test]
    fn test_complementary_yaw_is_uncorrected() {
        let mut filter = ComplementaryFilter::default();
        for _ in 0..100 {
            filter.update([0.0, 0.0, 0.5], [0.0, 0.0, 1.0], 0.01);
        }
        assert!((filter.angles()[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_config_builds_selected_filter() {
        let config = FusionConfig {
            algorithm: FusionAlgorithm::Complementary,
            ..FusionConfig::default()
        };
        let mut filter = config.build();
        filter.update([0.0; 3], [0.0, 0.0, 1.0], 0.01);
        assert_eq!(filter.orientation(), Quaternion::IDENTITY);
    }
}
