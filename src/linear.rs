//! Gravity removal.
//!
//! The gravity direction in the body frame is the world "up" axis (0, 0, 1)
//! seen through the orientation, i.e. the third row of its rotation matrix:
//!
//! - x = 2(qx*qz - qw*qy)
//! - y = 2(qw*qx + qy*qz)
//! - z = qw² - qx² - qy² + qz²

use crate::fusion::Quaternion;
use crate::units::STANDARD_GRAVITY;

/// Unit gravity direction in the body frame for the given orientation
pub fn gravity_vector(q: &Quaternion) -> [f64; 3] {
    [
        2.0 * (q.x * q.z - q.w * q.y),
        2.0 * (q.w * q.x + q.y * q.z),
        q.w * q.w - q.x * q.x - q.y * q.y + q.z * q.z,
    ]
}

/// Measured acceleration minus the gravity estimate, in m/s²
pub fn extract(accel_ms2: [f64; 3], gravity_unit: [f64; 3]) -> [f64; 3] {
    [
        accel_ms2[0] - gravity_unit[0] * STANDARD_GRAVITY,
        accel_ms2[1] - gravity_unit[1] * STANDARD_GRAVITY,
        accel_ms2[2] - gravity_unit[2] * STANDARD_GRAVITY,
    ]
}
