//! Settings control protocol: typed requests/responses and their fixed-size
//! little-endian wire form.
//!
//! Every message is exactly [`MESSAGE_SIZE`] bytes:
//! `[u32 event][payload...][zero padding]`.

use crate::{OwoError, Result};
use glam::DVec3;

pub const PROTOCOL_VERSION: u32 = 8;
pub const MESSAGE_SIZE: usize = 40;

/// Id reported back when session creation fails.
pub const CREATE_FAILED: i32 = -1;
/// Wire value for "no anchor".
const NO_ANCHOR: i32 = -1;
/// Largest anchor index the signed wire field can carry.
pub const MAX_ANCHOR: u32 = i32::MAX as u32;

// -- Event tags --
const EV_INVALID: u32 = 0;
const EV_GET_VERSION: u32 = 1;
const EV_VERSION: u32 = 2;
const EV_GET_SESSION_COUNT: u32 = 3;
const EV_SESSION_COUNT: u32 = 4;
const EV_GET_SESSION: u32 = 5;
const EV_SESSION: u32 = 6;
const EV_BYPASS_WAIT: u32 = 7;
const EV_SET_SETTING: u32 = 8;
const EV_GET_SETTING: u32 = 9;
const EV_SETTING: u32 = 10;
const EV_CREATE_SESSION: u32 = 11;
const EV_SESSION_CREATED: u32 = 12;
const EV_DESTROY_SESSION: u32 = 13;

/// Which per-session setting a request addresses.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    AnchorDeviceId = 0,
    OffsetGlobal = 1,
    OffsetLocalToAnchor = 2,
    OffsetLocalToDevice = 3,
    RotationGlobal = 4,
    RotationLocal = 5,
    YawOffset = 6,
    PredictPosition = 7,
    PredictionStrength = 8,
    IsCalibrating = 9,
    ConnectionAlive = 10,
    IsDownCalibrating = 11,
    HipMoveEnabled = 12,
    HipMoveAnalog = 13,
}

impl SettingKind {
    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            0 => Self::AnchorDeviceId,
            1 => Self::OffsetGlobal,
            2 => Self::OffsetLocalToAnchor,
            3 => Self::OffsetLocalToDevice,
            4 => Self::RotationGlobal,
            5 => Self::RotationLocal,
            6 => Self::YawOffset,
            7 => Self::PredictPosition,
            8 => Self::PredictionStrength,
            9 => Self::IsCalibrating,
            10 => Self::ConnectionAlive,
            11 => Self::IsDownCalibrating,
            12 => Self::HipMoveEnabled,
            13 => Self::HipMoveAnalog,
            other => return Err(OwoError::UnknownSettingKind(other)),
        })
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, Self::ConnectionAlive)
    }
}

/// A setting together with its correctly-typed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    AnchorDeviceId(Option<u32>),
    OffsetGlobal(DVec3),
    OffsetLocalToAnchor(DVec3),
    OffsetLocalToDevice(DVec3),
    RotationGlobal(DVec3),
    RotationLocal(DVec3),
    YawOffset(f64),
    PredictPosition(bool),
    PredictionStrength(f64),
    IsCalibrating(bool),
    ConnectionAlive(bool),
    IsDownCalibrating(bool),
    HipMoveEnabled(bool),
    /// Only x and y are used.
    HipMoveAnalog(DVec3),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::AnchorDeviceId(_) => SettingKind::AnchorDeviceId,
            Self::OffsetGlobal(_) => SettingKind::OffsetGlobal,
            Self::OffsetLocalToAnchor(_) => SettingKind::OffsetLocalToAnchor,
            Self::OffsetLocalToDevice(_) => SettingKind::OffsetLocalToDevice,
            Self::RotationGlobal(_) => SettingKind::RotationGlobal,
            Self::RotationLocal(_) => SettingKind::RotationLocal,
            Self::YawOffset(_) => SettingKind::YawOffset,
            Self::PredictPosition(_) => SettingKind::PredictPosition,
            Self::PredictionStrength(_) => SettingKind::PredictionStrength,
            Self::IsCalibrating(_) => SettingKind::IsCalibrating,
            Self::ConnectionAlive(_) => SettingKind::ConnectionAlive,
            Self::IsDownCalibrating(_) => SettingKind::IsDownCalibrating,
            Self::HipMoveEnabled(_) => SettingKind::HipMoveEnabled,
            Self::HipMoveAnalog(_) => SettingKind::HipMoveAnalog,
        }
    }

    fn encode(&self, out: &mut [u8]) {
        match *self {
            Self::AnchorDeviceId(id) => {
                let wire = id.and_then(|v| i32::try_from(v).ok()).unwrap_or(NO_ANCHOR);
                out[0..4].copy_from_slice(&wire.to_le_bytes());
            }
            Self::YawOffset(v) | Self::PredictionStrength(v) => {
                out[0..8].copy_from_slice(&v.to_le_bytes());
            }
            Self::PredictPosition(b)
            | Self::IsCalibrating(b)
            | Self::ConnectionAlive(b)
            | Self::IsDownCalibrating(b)
            | Self::HipMoveEnabled(b) => out[0] = b as u8,
            Self::OffsetGlobal(v)
            | Self::OffsetLocalToAnchor(v)
            | Self::OffsetLocalToDevice(v)
            | Self::RotationGlobal(v)
            | Self::RotationLocal(v)
            | Self::HipMoveAnalog(v) => {
                for (i, c) in v.to_array().iter().enumerate() {
                    out[i * 8..i * 8 + 8].copy_from_slice(&c.to_le_bytes());
                }
            }
        }
    }

    fn decode(kind: SettingKind, data: &[u8]) -> Self {
        let vector = || DVec3::new(read_f64(data, 0), read_f64(data, 8), read_f64(data, 16));
        let flag = data[0] != 0;
        match kind {
            SettingKind::AnchorDeviceId => {
                let raw = read_i32(data, 0);
                Self::AnchorDeviceId(u32::try_from(raw).ok())
            }
            SettingKind::OffsetGlobal => Self::OffsetGlobal(vector()),
            SettingKind::OffsetLocalToAnchor => Self::OffsetLocalToAnchor(vector()),
            SettingKind::OffsetLocalToDevice => Self::OffsetLocalToDevice(vector()),
            SettingKind::RotationGlobal => Self::RotationGlobal(vector()),
            SettingKind::RotationLocal => Self::RotationLocal(vector()),
            SettingKind::YawOffset => Self::YawOffset(read_f64(data, 0)),
            SettingKind::PredictPosition => Self::PredictPosition(flag),
            SettingKind::PredictionStrength => Self::PredictionStrength(read_f64(data, 0)),
            SettingKind::IsCalibrating => Self::IsCalibrating(flag),
            SettingKind::ConnectionAlive => Self::ConnectionAlive(flag),
            SettingKind::IsDownCalibrating => Self::IsDownCalibrating(flag),
            SettingKind::HipMoveEnabled => Self::HipMoveEnabled(flag),
            SettingKind::HipMoveAnalog => Self::HipMoveAnalog(vector()),
        }
    }
}

/// A setting value that is allowed to be written.
///
/// Only constructible through [`WritableSetting::new`], which refuses
/// read-only kinds, so a set request for connection liveness cannot exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritableSetting(SettingValue);

impl WritableSetting {
    pub fn new(value: SettingValue) -> Result<Self> {
        let kind = value.kind();
        if kind.is_read_only() {
            return Err(OwoError::ReadOnlySetting(kind));
        }
        if let SettingValue::AnchorDeviceId(Some(id)) = value {
            if id > MAX_ANCHOR {
                return Err(OwoError::AnchorOutOfRange(id));
            }
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> SettingValue {
        self.0
    }
}

/// Summary of one registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub exists: bool,
    pub id: u32,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    GetVersion,
    GetSessionCount,
    GetSession { index: u32 },
    BypassWait,
    SetSetting { session: u32, setting: WritableSetting },
    GetSetting { session: u32, kind: SettingKind },
    /// Raw wire port; values outside the u16 range fail creation.
    CreateSession { port: u32 },
    DestroySession { session: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlResponse {
    Version(u32),
    SessionCount(u32),
    Session(SessionSummary),
    Setting { session: u32, value: SettingValue },
    /// New session id, or `None` when the port was taken or could not be bound.
    SessionCreated(Option<u32>),
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    read_u32(data, at) as i32
}

fn read_f64(data: &[u8], at: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[at..at + 8]);
    f64::from_le_bytes(b)
}

fn check_size(data: &[u8]) -> Result<()> {
    if data.len() != MESSAGE_SIZE {
        return Err(OwoError::MessageSize {
            expected: MESSAGE_SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

fn new_message(event: u32) -> [u8; MESSAGE_SIZE] {
    let mut buf = [0u8; MESSAGE_SIZE];
    buf[0..4].copy_from_slice(&event.to_le_bytes());
    buf
}

impl ControlRequest {
    pub fn get_setting(session: u32, kind: SettingKind) -> Self {
        Self::GetSetting { session, kind }
    }

    /// Build a set request, rejecting read-only kinds.
    pub fn set_setting(session: u32, value: SettingValue) -> Result<Self> {
        Ok(Self::SetSetting {
            session,
            setting: WritableSetting::new(value)?,
        })
    }

    pub fn encode(&self) -> [u8; MESSAGE_SIZE] {
        match *self {
            Self::GetVersion => new_message(EV_GET_VERSION),
            Self::GetSessionCount => new_message(EV_GET_SESSION_COUNT),
            Self::GetSession { index } => {
                let mut buf = new_message(EV_GET_SESSION);
                buf[4..8].copy_from_slice(&index.to_le_bytes());
                buf
            }
            Self::BypassWait => new_message(EV_BYPASS_WAIT),
            Self::SetSetting { session, setting } => {
                let value = setting.value();
                let mut buf = new_message(EV_SET_SETTING);
                buf[4..8].copy_from_slice(&session.to_le_bytes());
                buf[8..12].copy_from_slice(&(value.kind() as u32).to_le_bytes());
                value.encode(&mut buf[16..]);
                buf
            }
            Self::GetSetting { session, kind } => {
                let mut buf = new_message(EV_GET_SETTING);
                buf[4..8].copy_from_slice(&session.to_le_bytes());
                buf[8..12].copy_from_slice(&(kind as u32).to_le_bytes());
                buf
            }
            Self::CreateSession { port } => {
                let mut buf = new_message(EV_CREATE_SESSION);
                buf[4..8].copy_from_slice(&port.to_le_bytes());
                buf
            }
            Self::DestroySession { session } => {
                let mut buf = new_message(EV_DESTROY_SESSION);
                buf[4..8].copy_from_slice(&session.to_le_bytes());
                buf
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        check_size(data)?;
        let event = read_u32(data, 0);
        Ok(match event {
            EV_GET_VERSION => Self::GetVersion,
            EV_GET_SESSION_COUNT => Self::GetSessionCount,
            EV_GET_SESSION => Self::GetSession {
                index: read_u32(data, 4),
            },
            EV_BYPASS_WAIT => Self::BypassWait,
            EV_SET_SETTING => {
                let kind = SettingKind::from_u32(read_u32(data, 8))?;
                Self::set_setting(read_u32(data, 4), SettingValue::decode(kind, &data[16..]))?
            }
            EV_GET_SETTING => Self::GetSetting {
                session: read_u32(data, 4),
                kind: SettingKind::from_u32(read_u32(data, 8))?,
            },
            EV_CREATE_SESSION => Self::CreateSession {
                port: read_u32(data, 4),
            },
            EV_DESTROY_SESSION => Self::DestroySession {
                session: read_u32(data, 4),
            },
            other => return Err(OwoError::UnknownEvent(other)),
        })
    }
}

impl ControlResponse {
    pub fn encode(&self) -> [u8; MESSAGE_SIZE] {
        match *self {
            Self::Version(v) => {
                let mut buf = new_message(EV_VERSION);
                buf[4..8].copy_from_slice(&v.to_le_bytes());
                buf
            }
            Self::SessionCount(n) => {
                let mut buf = new_message(EV_SESSION_COUNT);
                buf[4..8].copy_from_slice(&n.to_le_bytes());
                buf
            }
            Self::Session(s) => {
                let mut buf = new_message(EV_SESSION);
                buf[4] = s.exists as u8;
                buf[8..12].copy_from_slice(&s.id.to_le_bytes());
                buf[12..16].copy_from_slice(&(s.port as u32).to_le_bytes());
                buf
            }
            Self::Setting { session, value } => {
                let mut buf = new_message(EV_SETTING);
                buf[4..8].copy_from_slice(&session.to_le_bytes());
                buf[8..12].copy_from_slice(&(value.kind() as u32).to_le_bytes());
                value.encode(&mut buf[16..]);
                buf
            }
            Self::SessionCreated(id) => {
                let mut buf = new_message(EV_SESSION_CREATED);
                let wire = id.and_then(|v| i32::try_from(v).ok()).unwrap_or(CREATE_FAILED);
                buf[4..8].copy_from_slice(&wire.to_le_bytes());
                buf
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        check_size(data)?;
        let event = read_u32(data, 0);
        Ok(match event {
            EV_VERSION => Self::Version(read_u32(data, 4)),
            EV_SESSION_COUNT => Self::SessionCount(read_u32(data, 4)),
            EV_SESSION => Self::Session(SessionSummary {
                exists: data[4] != 0,
                id: read_u32(data, 8),
                port: read_u32(data, 12) as u16,
            }),
            EV_SETTING => {
                let kind = SettingKind::from_u32(read_u32(data, 8))?;
                Self::Setting {
                    session: read_u32(data, 4),
                    value: SettingValue::decode(kind, &data[16..]),
                }
            }
            EV_SESSION_CREATED => Self::SessionCreated(u32::try_from(read_i32(data, 4)).ok()),
            EV_INVALID => return Err(OwoError::UnknownEvent(EV_INVALID)),
            other => return Err(OwoError::UnknownEvent(other)),
        })
    }
}
