use crate::composer::{self, Calibration};
use crate::control::{SettingKind, SettingValue, WritableSetting};
use crate::controller::HipController;
use crate::host::{Host, HostEvent};
use crate::link::SensorLink;
use crate::predictor::PositionPredictor;
use crate::types::{DeviceKind, DriverPose, HostPose, ObjectId, TrackerSettings};
use crate::{OwoError, Result};
use glam::{DMat3, DVec3};
use std::time::Instant;

// -- Legacy debug-request message types --
const DEBUG_SET_CALIBRATION: u8 = 1;
const DEBUG_GET_CALIBRATION: u8 = 2;
const DEBUG_SET_PREDICTION: u8 = 3;
const DEBUG_GET_PREDICTION: u8 = 4;
const DEBUG_GET_DRIVER_VERSION: u8 = 5;
const DEBUG_SET_YAW: u8 = 6;
const DEBUG_GET_YAW: u8 = 7;
const DEBUG_GET_CONNECTION_ALIVE: u8 = 8;

/// Debug booleans are encoded as 1 (false) / 2 (true).
fn debug_bool(v: bool) -> u8 {
    if v {
        2
    } else {
        1
    }
}

pub fn tracker_serial(id: u32) -> String {
    format!("VIRT_TRACK0{}", id)
}

/// Runtime state for one phone-driven tracker.
pub struct Session {
    id: u32,
    object: ObjectId,
    serial: String,
    pub settings: TrackerSettings,
    pub calibration: Calibration,
    last_basis: DMat3,
    predictor: PositionPredictor,
    link: SensorLink,
    controller: Option<HipController>,
    /// Whether the host currently holds a valid pose from us.
    reported_alive: bool,
}

impl Session {
    pub fn new(id: u32, object: ObjectId, link: SensorLink, settings: TrackerSettings) -> Self {
        Self {
            id,
            object,
            serial: tracker_serial(id),
            settings,
            calibration: Calibration::default(),
            last_basis: DMat3::IDENTITY,
            predictor: PositionPredictor::new(),
            link,
            controller: None,
            reported_alive: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.link.port()
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn last_basis(&self) -> &DMat3 {
        &self.last_basis
    }

    pub fn controller(&self) -> Option<&HipController> {
        self.controller.as_ref()
    }

    /// Drain the session's socket.
    pub fn tick_link(&mut self, now: Instant) -> Result<()> {
        self.link.tick(now)
    }

    pub fn is_alive(&mut self, now: Instant) -> bool {
        self.link.is_alive(now)
    }

    /// Compose and emit this frame's pose, then refresh the hip controller.
    ///
    /// Without new data nothing is emitted, except a single invalid pose
    /// when the connection has just been lost.
    pub fn run_frame(&mut self, host: &mut dyn Host, poses: &[HostPose], now: Instant) {
        if self.link.take_new_data() {
            let anchor = composer::resolve_anchor(self.settings.anchor_device_id, poses);
            let composed = composer::compose(
                &mut self.settings,
                self.calibration,
                self.link.sample(),
                anchor,
                &mut self.predictor,
            );
            self.last_basis = composed.basis;
            host.pose_updated(self.object, &composed.pose);
            self.reported_alive = true;
        } else if self.reported_alive && !self.link.is_alive(now) {
            log::info!("{}: connection lost", self.serial);
            self.send_invalid_pose(host);
        }

        if let Some(controller) = &self.controller {
            controller.update(host, &self.last_basis, poses.first());
        }
    }

    /// Tell the host to stop tracking this device.
    pub fn send_invalid_pose(&mut self, host: &mut dyn Host) {
        host.pose_updated(self.object, &DriverPose::invalid());
        self.reported_alive = false;
    }

    pub fn process_host_event(&mut self, event: &HostEvent) -> Result<()> {
        match *event {
            HostEvent::HapticVibration {
                object,
                duration_s,
                frequency,
                amplitude,
            } if object == self.object => {
                log::debug!("{}: buzz {:.2}s", self.serial, duration_s);
                self.link.buzz(duration_s, frequency, amplitude)
            }
            HostEvent::HapticVibration { .. } => Ok(()),
        }
    }

    /// Current value of a setting.
    pub fn get_setting(&mut self, kind: SettingKind, now: Instant) -> SettingValue {
        let s = &self.settings;
        match kind {
            SettingKind::AnchorDeviceId => SettingValue::AnchorDeviceId(s.anchor_device_id),
            SettingKind::OffsetGlobal => SettingValue::OffsetGlobal(s.offset_global),
            SettingKind::OffsetLocalToAnchor => {
                SettingValue::OffsetLocalToAnchor(s.offset_local_to_anchor)
            }
            SettingKind::OffsetLocalToDevice => {
                SettingValue::OffsetLocalToDevice(s.offset_local_to_device)
            }
            SettingKind::RotationGlobal => SettingValue::RotationGlobal(s.global_rot),
            SettingKind::RotationLocal => SettingValue::RotationLocal(s.local_rot),
            SettingKind::YawOffset => SettingValue::YawOffset(s.yaw_offset),
            SettingKind::PredictPosition => SettingValue::PredictPosition(s.predict_position),
            SettingKind::PredictionStrength => {
                SettingValue::PredictionStrength(s.prediction_strength)
            }
            SettingKind::IsCalibrating => SettingValue::IsCalibrating(self.calibration.calibrating),
            SettingKind::IsDownCalibrating => {
                SettingValue::IsDownCalibrating(self.calibration.down_calibrating)
            }
            SettingKind::ConnectionAlive => SettingValue::ConnectionAlive(self.link.is_alive(now)),
            SettingKind::HipMoveEnabled => SettingValue::HipMoveEnabled(
                self.controller.as_ref().map(|c| c.enabled).unwrap_or(false),
            ),
            SettingKind::HipMoveAnalog => SettingValue::HipMoveAnalog(
                self.controller
                    .as_ref()
                    .map(|c| c.analog)
                    .unwrap_or(DVec3::ZERO),
            ),
        }
    }

    /// Write a setting. Enabling the hip controller the first time registers
    /// it with the host.
    pub fn set_setting(&mut self, setting: WritableSetting, host: &mut dyn Host) -> Result<()> {
        let s = &mut self.settings;
        match setting.value() {
            SettingValue::AnchorDeviceId(v) => s.anchor_device_id = v,
            SettingValue::OffsetGlobal(v) => s.offset_global = v,
            SettingValue::OffsetLocalToAnchor(v) => s.offset_local_to_anchor = v,
            SettingValue::OffsetLocalToDevice(v) => s.offset_local_to_device = v,
            SettingValue::RotationGlobal(v) => s.global_rot = v,
            SettingValue::RotationLocal(v) => s.local_rot = v,
            SettingValue::YawOffset(v) => s.yaw_offset = v,
            SettingValue::PredictPosition(v) => s.predict_position = v,
            SettingValue::PredictionStrength(v) => s.prediction_strength = v,
            SettingValue::IsCalibrating(v) => self.calibration.calibrating = v,
            SettingValue::IsDownCalibrating(v) => self.calibration.down_calibrating = v,
            SettingValue::ConnectionAlive(_) => {
                return Err(OwoError::ReadOnlySetting(SettingKind::ConnectionAlive))
            }
            SettingValue::HipMoveEnabled(enabled) => {
                if let Some(controller) = &mut self.controller {
                    controller.enabled = enabled;
                } else if enabled {
                    let serial = format!("{}_HipMove", self.serial);
                    let object = host.add_device(&serial, DeviceKind::HipController)?;
                    log::info!("{}: attached hip controller as object {}", self.serial, object);
                    let mut controller = HipController::new(object, serial);
                    controller.enabled = true;
                    self.controller = Some(controller);
                }
            }
            SettingValue::HipMoveAnalog(v) => match &mut self.controller {
                Some(controller) => controller.analog = v,
                None => log::debug!("{}: analog input without hip controller", self.serial),
            },
        }
        Ok(())
    }

    /// Answer the host's byte-coded debug channel.
    pub fn debug_request(&mut self, request: &[u8], now: Instant) -> Vec<u8> {
        let Some(&msg_type) = request.first() else {
            return vec![0];
        };
        let arg = request.get(1).copied().unwrap_or(0);

        match msg_type {
            DEBUG_SET_CALIBRATION => {
                self.calibration.calibrating = arg == 2;
                Vec::new()
            }
            DEBUG_GET_CALIBRATION => vec![debug_bool(self.calibration.calibrating)],
            DEBUG_SET_PREDICTION => {
                self.settings.predict_position = arg == 2;
                Vec::new()
            }
            DEBUG_GET_PREDICTION => vec![debug_bool(self.settings.predict_position)],
            DEBUG_GET_DRIVER_VERSION => vec![1],
            DEBUG_SET_YAW => {
                let text = &request[1..];
                let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
                match String::from_utf8_lossy(&text[..end]).trim().parse::<f64>() {
                    Ok(yaw) => self.settings.yaw_offset = yaw,
                    Err(e) => log::warn!("{}: bad yaw in debug request: {}", self.serial, e),
                }
                Vec::new()
            }
            DEBUG_GET_YAW => {
                let mut out = format!("{:.6}", self.settings.yaw_offset).into_bytes();
                out.push(0);
                out
            }
            DEBUG_GET_CONNECTION_ALIVE => vec![debug_bool(self.link.is_alive(now))],
            other => {
                log::warn!("{}: unknown debug message type {}", self.serial, other);
                vec![0]
            }
        }
    }
}
