//! # owo-bridge - phone IMU packets to calibrated tracker poses
//!
//! Receives orientation/gyro/accelerometer datagrams from phones over UDP
//! and turns them into tracker poses for a host tracking runtime.
//! Provides:
//! - Sensor packet codec with sequencing and liveness
//! - Pose composition with anchor offsets, live calibration and an
//!   optional position predictor
//! - A fixed-size control protocol for reading/writing per-session settings
//! - C FFI for embedding in a native host driver
//!
//! ## Quick Start
//! ```no_run
//! use owo_bridge::{Driver, DriverConfig, RecordingHost, UdpBinder};
//! use std::time::Instant;
//!
//! let config = DriverConfig {
//!     startup_ports: vec![6969],
//!     ..DriverConfig::default()
//! };
//! let mut driver = Driver::new(RecordingHost::new(), Box::new(UdpBinder), &config);
//! loop {
//!     driver.run_frame(Instant::now());
//!     std::thread::sleep(std::time::Duration::from_millis(11));
//! }
//! ```

pub mod error;
pub mod types;
pub mod math;
pub mod protocol;
pub mod liveness;
pub mod predictor;
pub mod transport;
pub mod link;
pub mod control;
pub mod host;
pub mod controller;
pub mod composer;
pub mod session;
pub mod registry;
pub mod config;
pub mod discovery;
pub mod ipc;
pub mod driver;
mod bus;
pub mod ffi;

pub use config::DriverConfig;
pub use control::{ControlRequest, ControlResponse, SettingKind, SettingValue};
pub use driver::Driver;
pub use error::OwoError;
pub use host::{Host, HostEvent, RecordingHost};
pub use transport::{Binder, DatagramSocket, UdpBinder};
pub use types::*;

/// Result type alias for owo-bridge operations.
pub type Result<T> = std::result::Result<T, OwoError>;
