use crate::types::{DeviceKind, DriverPose, HostPose, ObjectId};
use crate::Result;

/// Input channels the hip controller publishes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputComponent {
    JoystickX = 0,
    JoystickY = 1,
    JoystickTouch = 2,
}

/// Events the host routes to the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    HapticVibration {
        object: ObjectId,
        duration_s: f32,
        frequency: f32,
        amplitude: f32,
    },
}

/// The tracking runtime the bridge feeds.
pub trait Host {
    /// Register a device and return the object id the host assigned it.
    fn add_device(&mut self, serial: &str, kind: DeviceKind) -> Result<ObjectId>;

    fn pose_updated(&mut self, object: ObjectId, pose: &DriverPose);

    /// This frame's poses for every host device, indexed by object id.
    fn raw_poses(&mut self) -> Vec<HostPose>;

    fn poll_event(&mut self) -> Option<HostEvent>;

    fn update_scalar(&mut self, object: ObjectId, component: InputComponent, value: f64);

    fn update_boolean(&mut self, object: ObjectId, component: InputComponent, value: bool);
}

/// Host double that records everything the driver does.
#[derive(Debug, Default)]
pub struct RecordingHost {
    /// Registered devices in order; index + `first_object` is the object id.
    pub devices: Vec<(String, DeviceKind)>,
    pub poses: Vec<(ObjectId, DriverPose)>,
    pub scalars: Vec<(ObjectId, InputComponent, f64)>,
    pub booleans: Vec<(ObjectId, InputComponent, bool)>,
    /// Returned from `raw_poses` every frame.
    pub frame_poses: Vec<HostPose>,
    pub events: Vec<HostEvent>,
    /// Object ids start here so tracker ids don't collide with the headset.
    pub first_object: ObjectId,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            first_object: 1,
            ..Self::default()
        }
    }

    /// Poses emitted for `object`, oldest first.
    pub fn poses_for(&self, object: ObjectId) -> Vec<DriverPose> {
        self.poses
            .iter()
            .filter(|(o, _)| *o == object)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn last_pose(&self, object: ObjectId) -> Option<DriverPose> {
        self.poses_for(object).pop()
    }

    pub fn last_scalar(&self, object: ObjectId, component: InputComponent) -> Option<f64> {
        self.scalars
            .iter()
            .rev()
            .find(|(o, c, _)| *o == object && *c == component)
            .map(|(_, _, v)| *v)
    }

    pub fn last_boolean(&self, object: ObjectId, component: InputComponent) -> Option<bool> {
        self.booleans
            .iter()
            .rev()
            .find(|(o, c, _)| *o == object && *c == component)
            .map(|(_, _, v)| *v)
    }
}

impl Host for RecordingHost {
    fn add_device(&mut self, serial: &str, kind: DeviceKind) -> Result<ObjectId> {
        self.devices.push((serial.to_string(), kind));
        Ok(self.first_object + self.devices.len() as ObjectId - 1)
    }

    fn pose_updated(&mut self, object: ObjectId, pose: &DriverPose) {
        self.poses.push((object, *pose));
    }

    fn raw_poses(&mut self) -> Vec<HostPose> {
        self.frame_poses.clone()
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    fn update_scalar(&mut self, object: ObjectId, component: InputComponent, value: f64) {
        self.scalars.push((object, component, value));
    }

    fn update_boolean(&mut self, object: ObjectId, component: InputComponent, value: bool) {
        self.booleans.push((object, component, value));
    }
}
