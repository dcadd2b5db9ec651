use crate::control::SettingKind;
use std::fmt;

/// Errors that can occur inside the bridge.
///
/// None of these are fatal to a frame: callers log them at the tick
/// boundary and carry on with stale data.
#[derive(Debug, thiserror::Error)]
pub enum OwoError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Port {0} is already taken")]
    PortTaken(u16),

    #[error("Control message has {actual} bytes, expected {expected}")]
    MessageSize { expected: usize, actual: usize },

    #[error("Unknown control event tag {0}")]
    UnknownEvent(u32),

    #[error("Unknown setting kind {0}")]
    UnknownSettingKind(u32),

    #[error("Setting {0:?} is read-only")]
    ReadOnlySetting(SettingKind),

    #[error("Anchor index {0} does not fit the control wire")]
    AnchorOutOfRange(u32),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Host rejected device {0}")]
    HostRegistration(String),

    #[error("Timeout waiting for control response")]
    Timeout,

    #[error("Control channel disconnected")]
    ChannelDisconnected,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &OwoError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
