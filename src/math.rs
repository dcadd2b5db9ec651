//! Frame conventions and the handful of rotation helpers the pose pipeline
//! needs on top of `glam`.

use glam::{DMat3, DQuat, DVec3, EulerRot};
use std::f64::consts::FRAC_PI_2;

/// Host-space forward axis (headsets look down -Z).
pub const FORWARD: DVec3 = DVec3::new(0.0, 0.0, -1.0);

/// Rotates phone-native orientation so its "up" becomes the host's forward.
pub fn sensor_correction() -> DQuat {
    DQuat::from_axis_angle(DVec3::X, -FRAC_PI_2)
}

/// Yaw of `basis` measured with `front` as the facing axis.
///
/// The facing direction is flattened onto XZ and measured from +Z; the
/// result is negated relative to a right-handed yaw about +Y. Facing -Z
/// reads as ±π, continuous modulo 2π.
pub fn yaw_of(basis: &DMat3, front: DVec3) -> f64 {
    let facing = *basis * front;
    -facing.x.atan2(facing.z)
}

/// Yaw of a sensor-corrected device orientation (device up = facing).
pub fn quat_yaw(quat: DQuat) -> f64 {
    yaw_of(&DMat3::from_quat(quat), DVec3::Y)
}

/// Builds a rotation from an (x, y, z) Euler vector applied in YXZ order.
pub fn from_euler(euler: DVec3) -> DQuat {
    DQuat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z)
}

/// Inverse of [`from_euler`].
pub fn to_euler(quat: DQuat) -> DVec3 {
    let (y, x, z) = quat.to_euler(EulerRot::YXZ);
    DVec3::new(x, y, z)
}

/// Right-handed heading of a basis about +Y.
pub fn heading(basis: &DMat3) -> f64 {
    to_euler(DQuat::from_mat3(basis)).y
}
