use crate::types::Sample;
use glam::{DMat3, DVec3};

const GYRO_SMOOTHING: f64 = 0.1;
const ACCEL_SMOOTHING: f64 = 0.4;
/// Acceleration is attenuated by `1 + |gyro|² * ROTATION_DAMPING`.
const ROTATION_DAMPING: f64 = 4.0;
const DEAD_ZONE: f64 = 0.12;
const VELOCITY_DECAY: f64 = 1.12;
const VELOCITY_LOOKAHEAD: f64 = 3.0;
const TARGET_SHRINK: f64 = 1.6;
const POSITION_RELAXATION: f64 = 0.05;
const OUTPUT_SCALE: f64 = 100.0;

fn dead_zone(v: f64) -> f64 {
    if v.abs() < DEAD_ZONE {
        0.0
    } else {
        v - v.signum() * DEAD_ZONE
    }
}

fn dead_zone_vec(v: DVec3) -> DVec3 {
    DVec3::new(dead_zone(v.x), dead_zone(v.y), dead_zone(v.z))
}

/// Heuristic dead-reckoning filter producing a small position offset from
/// gyro and accelerometer samples.
///
/// Not a physical integrator: the constants above define its behavior,
/// drift included.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PositionPredictor {
    gyro: DVec3,
    acceleration: DVec3,
    velocity: DVec3,
    position: DVec3,
}

impl PositionPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one tick and return the offset in meters.
    ///
    /// `basis` is the tracker's final orientation, used to rotate the
    /// device-local acceleration into world space.
    pub fn predict(&mut self, sample: &Sample, basis: &DMat3) -> DVec3 {
        self.gyro = self.gyro.lerp(sample.gyro, GYRO_SMOOTHING);
        self.acceleration = self.acceleration.lerp(sample.accel, ACCEL_SMOOTHING);

        let accel_local = self.acceleration / (1.0 + self.gyro.length_squared() * ROTATION_DAMPING);
        let accel_local = dead_zone_vec(accel_local);

        self.velocity += *basis * accel_local;
        self.velocity = dead_zone_vec(self.velocity);
        self.velocity /= VELOCITY_DECAY;

        let target = (self.position + self.velocity * VELOCITY_LOOKAHEAD) / TARGET_SHRINK;
        self.position = self.position.lerp(target, POSITION_RELAXATION);

        self.position / OUTPUT_SCALE
    }

    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }
}
