use crate::host::{Host, InputComponent};
use crate::math::{yaw_of, FORWARD};
use crate::types::{HostPose, ObjectId};
use glam::{DMat3, DVec2, DVec3};
use std::f64::consts::PI;

/// Stick deflection above which the joystick counts as touched.
const TOUCH_THRESHOLD: f64 = 0.05;

/// Virtual joystick attached to a tracker, redirecting locomotion input
/// relative to where the wearer's hips face.
#[derive(Debug, Clone)]
pub struct HipController {
    object: ObjectId,
    serial: String,
    pub enabled: bool,
    /// Raw stick input from the overlay; only x and y are used.
    pub analog: DVec3,
}

impl HipController {
    pub fn new(object: ObjectId, serial: String) -> Self {
        Self {
            object,
            serial,
            enabled: false,
            analog: DVec3::ZERO,
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Publish this frame's stick values.
    ///
    /// While disabled the raw input passes straight through.
    pub fn update(&self, host: &mut dyn Host, tracker_basis: &DMat3, hmd: Option<&HostPose>) {
        let raw = self.analog.truncate();
        let out = if self.enabled {
            let hmd_basis = hmd.map(|p| p.basis).unwrap_or(DMat3::IDENTITY);
            let diff = yaw_of(tracker_basis, FORWARD) - yaw_of(&hmd_basis, FORWARD) - PI;
            let out = redirect(raw, diff);
            log::trace!(
                "HipMove {}: diff {:.2}, ({:.2}, {:.2}) -> ({:.2}, {:.2})",
                self.serial,
                diff,
                raw.x,
                raw.y,
                out.x,
                out.y
            );
            out
        } else {
            raw
        };

        host.update_scalar(self.object, InputComponent::JoystickX, out.x);
        host.update_scalar(self.object, InputComponent::JoystickY, out.y);
        host.update_boolean(
            self.object,
            InputComponent::JoystickTouch,
            out.length() > TOUCH_THRESHOLD,
        );
    }

    /// The controller has no debug channel of its own.
    pub fn debug_request(&self, _request: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}

/// Rotate a stick vector by `-diff` radians, keeping its magnitude.
pub fn redirect(stick: DVec2, diff: f64) -> DVec2 {
    let magnitude = stick.length();
    let angle = stick.y.atan2(stick.x) - diff;
    DVec2::new(angle.cos() * magnitude, angle.sin() * magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    #[test]
    fn test_redirect_keeps_magnitude() {
        let out = redirect(DVec2::new(0.6, 0.8), 1.3);
        assert!((out.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_redirect_quarter_turn() {
        let out = redirect(DVec2::new(1.0, 0.0), -std::f64::consts::FRAC_PI_2);
        assert!(out.x.abs() < 1e-12);
        assert!((out.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut host = RecordingHost::new();
        let mut c = HipController::new(5, "VIRT_TRACK00_HipMove".into());
        c.analog = DVec3::new(0.3, -0.2, 9.0);
        c.update(&mut host, &DMat3::IDENTITY, None);

        assert_eq!(host.last_scalar(5, InputComponent::JoystickX), Some(0.3));
        assert_eq!(host.last_scalar(5, InputComponent::JoystickY), Some(-0.2));
        assert_eq!(host.last_boolean(5, InputComponent::JoystickTouch), Some(true));
    }

    #[test]
    fn test_touch_threshold() {
        let mut host = RecordingHost::new();
        let mut c = HipController::new(5, "x".into());
        c.analog = DVec3::new(0.03, 0.03, 0.0);
        c.update(&mut host, &DMat3::IDENTITY, None);
        assert_eq!(host.last_boolean(5, InputComponent::JoystickTouch), Some(false));
    }

    #[test]
    fn test_enabled_redirects_by_facing_difference() {
        let mut host = RecordingHost::new();
        let mut c = HipController::new(5, "x".into());
        c.enabled = true;
        c.analog = DVec3::new(0.0, 1.0, 0.0);

        let hmd = HostPose {
            valid: true,
            basis: DMat3::from_rotation_y(0.3),
            ..HostPose::default()
        };
        let tracker = DMat3::from_rotation_y(0.3);
        c.update(&mut host, &tracker, Some(&hmd));

        // Same facing: diff is -π, so the stick flips.
        let x = host.last_scalar(5, InputComponent::JoystickX).unwrap();
        let y = host.last_scalar(5, InputComponent::JoystickY).unwrap();
        assert!(x.abs() < 1e-9);
        assert!((y + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_hmd_faces_forward() {
        let mut host = RecordingHost::new();
        let mut c = HipController::new(5, "x".into());
        c.enabled = true;
        c.analog = DVec3::new(0.0, 1.0, 0.0);

        // Tracker almost exactly along -Z, like an identity headset.
        c.update(&mut host, &DMat3::from_rotation_y(0.001), None);

        let x = host.last_scalar(5, InputComponent::JoystickX).unwrap();
        let y = host.last_scalar(5, InputComponent::JoystickY).unwrap();
        assert!(x.abs() < 0.01);
        assert!(y < -0.99);
    }
}
