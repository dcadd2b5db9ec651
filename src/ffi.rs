//! C FFI layer for owo-bridge.
//!
//! The host runtime supplies its side of the [`Host`] trait as C callbacks
//! and drives the bridge by calling [`owo_driver_run_frame`] once per
//! frame. The generated C header is written to `include/owo_bridge.h` by
//! cbindgen.

use crate::config::DriverConfig;
use crate::control::MESSAGE_SIZE;
use crate::driver::Driver;
use crate::error::LastError;
use crate::host::{Host, HostEvent, InputComponent};
use crate::transport::{Binder, UdpBinder};
use crate::types::{DeviceKind, DriverPose, HostPose, ObjectId, TrackingResult};
use crate::{OwoError, Result};
use glam::{DMat3, DVec3};
use std::collections::VecDeque;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::time::Instant;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Register a device. Write the assigned object id to `out_object` and
/// return true, or return false to reject it.
pub type OwoAddDeviceFn = extern "C" fn(
    user_data: *mut c_void,
    serial: *const c_char,
    kind: DeviceKind,
    out_object: *mut u32,
) -> bool;

pub type OwoPoseUpdatedFn = extern "C" fn(user_data: *mut c_void, object: u32, pose: *const OwoPose);

pub type OwoScalarFn =
    extern "C" fn(user_data: *mut c_void, object: u32, component: InputComponent, value: f64);

pub type OwoBooleanFn =
    extern "C" fn(user_data: *mut c_void, object: u32, component: InputComponent, value: bool);

/// Host callbacks. Any entry may be null; a null `add_device` rejects
/// every registration.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct OwoHostCallbacks {
    pub user_data: *mut c_void,
    pub add_device: Option<OwoAddDeviceFn>,
    pub pose_updated: Option<OwoPoseUpdatedFn>,
    pub update_scalar: Option<OwoScalarFn>,
    pub update_boolean: Option<OwoBooleanFn>,
}

/// Pose of one host device, as supplied each frame.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OwoHostPose {
    pub valid: bool,
    /// Device-to-world transform, row-major 3x4 (rotation | translation).
    pub matrix: [[f64; 4]; 3],
    pub velocity: [f64; 3],
}

/// Pose emitted for a bridge device.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OwoPose {
    pub position: [f64; 3],
    /// Quaternion [qx, qy, qz, qw].
    pub rotation: [f64; 4],
    pub velocity: [f64; 3],
    pub acceleration: [f64; 3],
    pub angular_velocity: [f64; 3],
    /// Bit 0 valid, bit 1 connected.
    pub flags: u32,
    pub result: TrackingResult,
}

impl From<&DriverPose> for OwoPose {
    fn from(p: &DriverPose) -> Self {
        Self {
            position: p.position.to_array(),
            rotation: p.rotation.to_array(),
            velocity: p.velocity.to_array(),
            acceleration: p.acceleration.to_array(),
            angular_velocity: p.angular_velocity.to_array(),
            flags: p.flags.bits(),
            result: p.result,
        }
    }
}

impl From<&OwoHostPose> for HostPose {
    fn from(p: &OwoHostPose) -> Self {
        let m = &p.matrix;
        Self {
            valid: p.valid,
            position: DVec3::new(m[0][3], m[1][3], m[2][3]),
            basis: DMat3::from_cols(
                DVec3::new(m[0][0], m[1][0], m[2][0]),
                DVec3::new(m[0][1], m[1][1], m[2][1]),
                DVec3::new(m[0][2], m[1][2], m[2][2]),
            ),
            velocity: DVec3::from_array(p.velocity),
        }
    }
}

/// [`Host`] backed by C callbacks. Poses and haptic events are pushed in
/// by the FFI entry points.
pub struct CallbackHost {
    callbacks: OwoHostCallbacks,
    poses: Vec<HostPose>,
    events: VecDeque<HostEvent>,
}

impl CallbackHost {
    pub fn new(callbacks: OwoHostCallbacks) -> Self {
        Self {
            callbacks,
            poses: Vec::new(),
            events: VecDeque::new(),
        }
    }
}

impl Host for CallbackHost {
    fn add_device(&mut self, serial: &str, kind: DeviceKind) -> Result<ObjectId> {
        let rejected = || OwoError::HostRegistration(serial.to_string());
        let add = self.callbacks.add_device.ok_or_else(rejected)?;
        let c_serial = CString::new(serial).map_err(|_| rejected())?;
        let mut object = 0u32;
        if add(self.callbacks.user_data, c_serial.as_ptr(), kind, &mut object) {
            Ok(object)
        } else {
            Err(rejected())
        }
    }

    fn pose_updated(&mut self, object: ObjectId, pose: &DriverPose) {
        if let Some(f) = self.callbacks.pose_updated {
            let out = OwoPose::from(pose);
            f(self.callbacks.user_data, object, &out);
        }
    }

    fn raw_poses(&mut self) -> Vec<HostPose> {
        self.poses.clone()
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    fn update_scalar(&mut self, object: ObjectId, component: InputComponent, value: f64) {
        if let Some(f) = self.callbacks.update_scalar {
            f(self.callbacks.user_data, object, component, value);
        }
    }

    fn update_boolean(&mut self, object: ObjectId, component: InputComponent, value: bool) {
        if let Some(f) = self.callbacks.update_boolean {
            f(self.callbacks.user_data, object, component, value);
        }
    }
}

/// Opaque driver handle for C consumers.
pub struct OwoDriver(Driver<CallbackHost>);

impl OwoDriver {
    fn with_binder(callbacks: OwoHostCallbacks, binder: Box<dyn Binder>, config: &DriverConfig) -> Self {
        OwoDriver(Driver::new(CallbackHost::new(callbacks), binder, config))
    }
}

unsafe fn load_config(path: *const c_char) -> Result<DriverConfig> {
    if path.is_null() {
        let mut config = DriverConfig::default();
        config.apply_env();
        return Ok(config);
    }
    let path = CStr::from_ptr(path).to_string_lossy().into_owned();
    DriverConfig::load(path)
}

/// Create a driver on real UDP sockets.
/// `config_path` may be null to use defaults. Returns NULL on error
/// (check owo_last_error()).
///
/// # Safety
/// `config_path` must be a valid null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_new(
    callbacks: OwoHostCallbacks,
    config_path: *const c_char,
) -> *mut OwoDriver {
    match load_config(config_path) {
        Ok(config) => Box::into_raw(Box::new(OwoDriver::with_binder(
            callbacks,
            Box::new(UdpBinder),
            &config,
        ))),
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Destroy a driver, closing every socket.
///
/// # Safety
/// `driver` must be a pointer returned by `owo_driver_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_free(driver: *mut OwoDriver) {
    if !driver.is_null() {
        drop(Box::from_raw(driver));
    }
}

/// Run one frame. `poses` holds the host's current device poses, indexed
/// by object id.
///
/// # Safety
/// `driver` must be a valid driver pointer, or null. `poses` must point to
/// `count` elements, or be null.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_run_frame(
    driver: *mut OwoDriver,
    poses: *const OwoHostPose,
    count: usize,
) {
    if driver.is_null() {
        return;
    }
    let driver = &mut *driver;
    let host = driver.0.host_mut();
    host.poses.clear();
    if !poses.is_null() {
        host.poses
            .extend(std::slice::from_raw_parts(poses, count).iter().map(HostPose::from));
    }
    driver.0.run_frame(Instant::now());
}

/// Queue a haptic pulse for the device owning `object`; it is sent on the
/// next frame.
///
/// # Safety
/// `driver` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_haptic(
    driver: *mut OwoDriver,
    object: u32,
    duration_s: f32,
    frequency: f32,
    amplitude: f32,
) {
    if driver.is_null() {
        return;
    }
    let driver = &mut *driver;
    driver.0.host_mut().events.push_back(HostEvent::HapticVibration {
        object,
        duration_s,
        frequency,
        amplitude,
    });
}

/// Handle one control message.
/// Returns 1 with `MESSAGE_SIZE` bytes written to `response`, 0 if the
/// request has no response, or -1 on bad arguments.
///
/// # Safety
/// `request` must point to `len` bytes. `response` must point to at least
/// `MESSAGE_SIZE` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_control(
    driver: *mut OwoDriver,
    request: *const u8,
    len: usize,
    response: *mut u8,
) -> c_int {
    if driver.is_null() || request.is_null() || response.is_null() {
        return -1;
    }
    let driver = &mut *driver;
    let request = std::slice::from_raw_parts(request, len);
    match driver.0.handle_control_bytes(request, Instant::now()) {
        Some(bytes) => {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), response, MESSAGE_SIZE);
            1
        }
        None => 0,
    }
}

/// Forward a host debug request to the device owning `object`.
/// Returns the response length (truncated to `out_cap`), or -1 if no
/// device owns `object`.
///
/// # Safety
/// `request` must point to `len` bytes; `out` must point to `out_cap`
/// writable bytes, or be null with `out_cap` 0.
#[no_mangle]
pub unsafe extern "C" fn owo_driver_debug_request(
    driver: *mut OwoDriver,
    object: u32,
    request: *const u8,
    len: usize,
    out: *mut u8,
    out_cap: usize,
) -> c_int {
    if driver.is_null() || request.is_null() {
        return -1;
    }
    let driver = &mut *driver;
    let request = std::slice::from_raw_parts(request, len);
    match driver.0.debug_request(object, request, Instant::now()) {
        Some(reply) => {
            let n = reply.len().min(out_cap);
            if n > 0 && !out.is_null() {
                std::ptr::copy_nonoverlapping(reply.as_ptr(), out, n);
            }
            n as c_int
        }
        None => -1,
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next owo-bridge API call.
#[no_mangle]
pub extern "C" fn owo_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
