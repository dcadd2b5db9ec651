//! Turns the latest sensor sample and a session's settings into the pose
//! handed to the host.

use crate::math::{self, FORWARD};
use crate::predictor::PositionPredictor;
use crate::types::{DriverPose, HostPose, PoseFlags, Sample, TrackerSettings, TrackingResult};
use glam::{DMat3, DQuat, DVec3};

/// Height added above the headset's facing direction while calibrating.
const CALIBRATION_LIFT: DVec3 = DVec3::new(0.0, 0.2, 0.0);

/// Level-triggered calibration modes. While a flag is held the dependent
/// settings are recomputed every frame; releasing it keeps the last values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Snap yaw and position to the anchor's facing.
    pub calibrating: bool,
    /// Align the local rotation against the anchor's heading.
    pub down_calibrating: bool,
}

/// Result of one composition step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composed {
    pub pose: DriverPose,
    /// Final orientation basis, cached for the hip controller.
    pub basis: DMat3,
}

/// Look up the anchor's pose for this frame.
///
/// Missing or invalid entries yield `None`, which composes as if no anchor
/// were configured.
pub fn resolve_anchor(anchor: Option<u32>, poses: &[HostPose]) -> Option<&HostPose> {
    let index = anchor? as usize;
    match poses.get(index) {
        Some(pose) if pose.valid => Some(pose),
        _ => {
            log::trace!("Anchor {} unavailable this frame", index);
            None
        }
    }
}

fn corrected_rotation(raw: DQuat) -> DQuat {
    let q = math::sensor_correction() * raw;
    if q.length_squared() > f64::EPSILON {
        q.normalize()
    } else {
        math::sensor_correction()
    }
}

/// Compose a final pose.
///
/// `settings` is mutated only while a calibration flag is held.
pub fn compose(
    settings: &mut TrackerSettings,
    calibration: Calibration,
    sample: &Sample,
    anchor: Option<&HostPose>,
    predictor: &mut PositionPredictor,
) -> Composed {
    let (mut position, anchor_basis, velocity) = match anchor {
        Some(a) => (a.position, a.basis, a.velocity),
        None => (DVec3::ZERO, DMat3::IDENTITY, DVec3::ZERO),
    };

    for (axis, axis_override) in [settings.x_override, settings.y_override, settings.z_override]
        .into_iter()
        .enumerate()
    {
        if axis_override.enabled {
            position[axis] = axis_override.to;
        }
    }

    let device = corrected_rotation(sample.rotation);

    if calibration.calibrating {
        settings.global_rot.y = math::quat_yaw(device) - math::yaw_of(&anchor_basis, FORWARD);
        let facing = (anchor_basis * FORWARD * DVec3::new(1.0, 0.0, 1.0)).normalize_or_zero();
        settings.offset_global = facing + CALIBRATION_LIFT;
        settings.offset_local_to_anchor = DVec3::ZERO;
        settings.offset_local_to_device = DVec3::ZERO;
    }

    let rotated = math::from_euler(settings.global_rot) * device;

    if calibration.down_calibrating {
        let upright = DQuat::from_rotation_y(math::heading(&anchor_basis));
        settings.local_rot = math::to_euler(rotated.inverse() * upright);
    }

    let rotation = (rotated * math::from_euler(settings.local_rot)).normalize();
    let basis = DMat3::from_quat(rotation);

    position += settings.offset_global
        + anchor_basis * settings.offset_local_to_anchor
        + basis * settings.offset_local_to_device;

    if settings.predict_position && !calibration.calibrating {
        position += predictor.predict(sample, &basis) * settings.prediction_strength;
    }

    let result = if calibration.calibrating {
        TrackingResult::Calibrating
    } else {
        TrackingResult::RunningOk
    };

    Composed {
        pose: DriverPose {
            position,
            rotation,
            velocity,
            acceleration: sample.accel,
            angular_velocity: DVec3::ZERO,
            flags: PoseFlags::VALID | PoseFlags::CONNECTED,
            result,
        },
        basis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn zeroed() -> TrackerSettings {
        TrackerSettings {
            anchor_device_id: None,
            offset_local_to_device: DVec3::ZERO,
            ..TrackerSettings::default()
        }
    }

    fn anchor_at(position: DVec3, yaw: f64) -> HostPose {
        HostPose {
            valid: true,
            position,
            basis: DMat3::from_rotation_y(yaw),
            velocity: DVec3::new(0.1, 0.0, 0.0),
        }
    }

    fn approx_vec(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_identity_round_trip() {
        let mut settings = zeroed();
        let mut predictor = PositionPredictor::new();
        let out = compose(
            &mut settings,
            Calibration::default(),
            &Sample::default(),
            None,
            &mut predictor,
        );
        assert_eq!(out.pose.position, DVec3::ZERO);
        assert!(out.pose.rotation.abs_diff_eq(math::sensor_correction(), 1e-12));
        assert!(out.pose.is_valid());
        assert_eq!(out.pose.result, TrackingResult::RunningOk);
        assert_eq!(out.pose.velocity, DVec3::ZERO);
    }

    #[test]
    fn test_resolve_anchor() {
        let poses = [anchor_at(DVec3::ONE, 0.0), HostPose::default()];
        assert!(resolve_anchor(Some(0), &poses).is_some());
        assert!(resolve_anchor(Some(1), &poses).is_none());
        assert!(resolve_anchor(Some(7), &poses).is_none());
        assert!(resolve_anchor(None, &poses).is_none());
    }

    #[test]
    fn test_offsets_compose_in_their_frames() {
        let mut settings = zeroed();
        settings.offset_global = DVec3::new(0.0, 1.0, 0.0);
        settings.offset_local_to_anchor = DVec3::new(0.0, 0.0, -1.0);
        settings.offset_local_to_device = DVec3::new(0.0, 0.5, 0.0);

        let anchor = anchor_at(DVec3::new(2.0, 0.0, 0.0), FRAC_PI_2);
        let out = compose(
            &mut settings,
            Calibration::default(),
            &Sample::default(),
            Some(&anchor),
            &mut PositionPredictor::new(),
        );

        // Anchor-local -Z turned a quarter about Y points along -X.
        // Device-local +Y points along host forward after the sensor correction.
        let expected = DVec3::new(2.0, 0.0, 0.0)
            + DVec3::new(0.0, 1.0, 0.0)
            + DVec3::new(-1.0, 0.0, 0.0)
            + DVec3::new(0.0, 0.0, -0.5);
        assert!(approx_vec(out.pose.position, expected));
        assert_eq!(out.pose.velocity, anchor.velocity);
    }

    #[test]
    fn test_axis_overrides_replace_anchor_components() {
        let mut settings = zeroed();
        settings.y_override.enabled = true;
        settings.y_override.to = 0.9;
        settings.offset_global = DVec3::new(0.0, 0.1, 0.0);

        let anchor = anchor_at(DVec3::new(1.0, 1.7, 3.0), 0.0);
        let out = compose(
            &mut settings,
            Calibration::default(),
            &Sample::default(),
            Some(&anchor),
            &mut PositionPredictor::new(),
        );
        assert!(approx_vec(out.pose.position, DVec3::new(1.0, 1.0, 3.0)));
    }

    #[test]
    fn test_calibration_faces_anchor() {
        let mut settings = zeroed();
        settings.offset_local_to_anchor = DVec3::ONE;
        // Device facing yawed 0.2 after the sensor correction.
        let raw = math::sensor_correction().inverse()
            * DQuat::from_rotation_y(0.2)
            * math::sensor_correction();
        let sample = Sample {
            rotation: raw,
            ..Sample::default()
        };
        let anchor = anchor_at(DVec3::new(0.0, 1.6, 0.0), 0.5);

        let out = compose(
            &mut settings,
            Calibration {
                calibrating: true,
                down_calibrating: false,
            },
            &sample,
            Some(&anchor),
            &mut PositionPredictor::new(),
        );

        let facing = out.basis * DVec3::Y;
        let anchor_facing = anchor.basis * FORWARD;
        assert!(approx_vec(facing, anchor_facing));
        assert!((settings.global_rot.y - 0.3).abs() < 1e-9);
        assert!(approx_vec(settings.offset_global, anchor_facing + CALIBRATION_LIFT));
        assert_eq!(settings.offset_local_to_anchor, DVec3::ZERO);
        assert_eq!(settings.offset_local_to_device, DVec3::ZERO);
        assert_eq!(out.pose.result, TrackingResult::Calibrating);
    }

    #[test]
    fn test_calibration_without_anchor_faces_forward() {
        for yaw in [0.01, -0.01, 0.0] {
            let mut settings = zeroed();
            let raw = math::sensor_correction().inverse()
                * DQuat::from_rotation_y(yaw)
                * math::sensor_correction();
            let sample = Sample {
                rotation: raw,
                ..Sample::default()
            };

            let out = compose(
                &mut settings,
                Calibration {
                    calibrating: true,
                    down_calibrating: false,
                },
                &sample,
                None,
                &mut PositionPredictor::new(),
            );

            let facing = out.basis * DVec3::Y;
            assert!(approx_vec(facing, FORWARD), "yaw {}: facing {:?}", yaw, facing);
            assert!(approx_vec(settings.offset_global, FORWARD + CALIBRATION_LIFT));
        }
    }

    #[test]
    fn test_down_calibration_levels_to_anchor_heading() {
        let mut settings = zeroed();
        let sample = Sample {
            rotation: DQuat::from_euler(glam::EulerRot::XYZ, 0.3, -0.4, 0.9),
            ..Sample::default()
        };
        let anchor = anchor_at(DVec3::ZERO, -0.7);
        let out = compose(
            &mut settings,
            Calibration {
                calibrating: false,
                down_calibrating: true,
            },
            &sample,
            Some(&anchor),
            &mut PositionPredictor::new(),
        );
        assert!(out
            .pose
            .rotation
            .abs_diff_eq(DQuat::from_rotation_y(-0.7), 1e-9)
            || out
                .pose
                .rotation
                .abs_diff_eq(-DQuat::from_rotation_y(-0.7), 1e-9));
    }

    #[test]
    fn test_prediction_skipped_while_calibrating() {
        let mut settings = zeroed();
        settings.predict_position = true;
        settings.prediction_strength = 10.0;
        let sample = Sample {
            accel: DVec3::new(5.0, 0.0, 0.0),
            ..Sample::default()
        };

        let mut predictor = PositionPredictor::new();
        let calibrating = Calibration {
            calibrating: true,
            down_calibrating: false,
        };
        compose(&mut settings, calibrating, &sample, None, &mut predictor);
        assert_eq!(predictor, PositionPredictor::new());

        let out = compose(
            &mut settings,
            Calibration::default(),
            &sample,
            None,
            &mut predictor,
        );
        assert_ne!(predictor, PositionPredictor::new());
        assert_eq!(out.pose.acceleration, sample.accel);
    }
}
