use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Deserializer};

/// Index the host runtime assigns to a registered device.
pub type ObjectId = u32;

/// Final pose handed to the host for one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPose {
    /// World-space position in meters.
    pub position: DVec3,
    pub rotation: DQuat,
    pub velocity: DVec3,
    /// Latest accelerometer sample (m/s²), passed through untouched.
    pub acceleration: DVec3,
    pub angular_velocity: DVec3,
    pub flags: PoseFlags,
    pub result: TrackingResult,
}

impl DriverPose {
    /// Pose that tells the host to drop tracking for a device.
    pub fn invalid() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            flags: PoseFlags::empty(),
            result: TrackingResult::OutOfRange,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(PoseFlags::VALID)
    }
}

bitflags::bitflags! {
    /// Validity bits carried by every emitted pose.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct PoseFlags: u32 {
        const VALID     = 1 << 0;
        const CONNECTED = 1 << 1;
    }
}

/// Tracking quality reported alongside a pose.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingResult {
    RunningOk = 0,
    Calibrating = 1,
    OutOfRange = 2,
}

/// One entry of the host's per-frame pose array, used for anchor lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostPose {
    pub valid: bool,
    pub position: DVec3,
    /// Orientation basis (columns are the device's local axes in world space).
    pub basis: DMat3,
    pub velocity: DVec3,
}

impl Default for HostPose {
    fn default() -> Self {
        Self {
            valid: false,
            position: DVec3::ZERO,
            basis: DMat3::IDENTITY,
            velocity: DVec3::ZERO,
        }
    }
}

/// Device classes this bridge can register with the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Generic tracker driven by a phone session.
    Tracker = 0,
    /// Virtual joystick attached to a tracker for hip-relative locomotion.
    HipController = 1,
}

/// Most recent decoded sensor reading for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Orientation quaternion as sent by the phone (x, y, z, w).
    pub rotation: DQuat,
    /// Gyroscope rates in rad/s.
    pub gyro: DVec3,
    /// Accelerometer in m/s².
    pub accel: DVec3,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            rotation: DQuat::IDENTITY,
            gyro: DVec3::ZERO,
            accel: DVec3::ZERO,
        }
    }
}

/// Absolute override for one position axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AxisOverride {
    pub enabled: bool,
    pub to: f64,
}

/// Per-session tuning, read and written through the control bus.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Host device whose pose is the reference frame; `None` anchors to
    /// the world origin.
    #[serde(deserialize_with = "anchor_from_signed")]
    pub anchor_device_id: Option<u32>,

    /// World-space offset in meters.
    pub offset_global: DVec3,
    /// Offset expressed in the anchor's orientation.
    pub offset_local_to_anchor: DVec3,
    /// Offset expressed in the tracker's own final orientation.
    pub offset_local_to_device: DVec3,

    /// Euler (YXZ) correction applied before the device rotation.
    pub global_rot: DVec3,
    /// Euler (YXZ) correction applied after the device rotation.
    pub local_rot: DVec3,

    /// Legacy yaw offset, superseded by `global_rot.y`.
    pub yaw_offset: f64,

    pub x_override: AxisOverride,
    pub y_override: AxisOverride,
    pub z_override: AxisOverride,

    pub predict_position: bool,
    pub prediction_strength: f64,
}

/// Config files spell "no anchor" as any negative index.
fn anchor_from_signed<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    if raw < 0 {
        return Ok(None);
    }
    match u32::try_from(raw) {
        Ok(id) if id <= crate::control::MAX_ANCHOR => Ok(Some(id)),
        _ => Err(serde::de::Error::custom(format!("anchor index {} out of range", raw))),
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            anchor_device_id: Some(0),
            offset_global: DVec3::ZERO,
            offset_local_to_anchor: DVec3::ZERO,
            offset_local_to_device: DVec3::new(0.0, -0.73, 0.0),
            global_rot: DVec3::ZERO,
            local_rot: DVec3::ZERO,
            yaw_offset: 0.0,
            x_override: AxisOverride::default(),
            y_override: AxisOverride::default(),
            z_override: AxisOverride::default(),
            predict_position: false,
            prediction_strength: 1.0,
        }
    }
}
