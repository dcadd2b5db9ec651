//! Run the bridge on real UDP sockets and print the poses it produces.
//!
//! Usage: cargo run --example serve [config.toml]
//! Point a phone (or the fake_phone example) at port 6969.
//! Press Ctrl+C to stop.

use owo_bridge::host::InputComponent;
use owo_bridge::{DeviceKind, Driver, DriverConfig, DriverPose, Host, HostEvent, HostPose, ObjectId, UdpBinder};
use std::time::{Duration, Instant};

/// Stand-in host runtime: logs registrations, prints every 100th pose.
#[derive(Default)]
struct PrintingHost {
    devices: Vec<String>,
    pose_count: u64,
}

impl Host for PrintingHost {
    fn add_device(&mut self, serial: &str, kind: DeviceKind) -> owo_bridge::Result<ObjectId> {
        self.devices.push(serial.to_string());
        println!("Registered {} as {:?}", serial, kind);
        // Object 0 is the headset.
        Ok(self.devices.len() as ObjectId)
    }

    fn pose_updated(&mut self, object: ObjectId, pose: &DriverPose) {
        self.pose_count += 1;
        if !pose.is_valid() {
            println!("object {}: tracking lost", object);
        } else if self.pose_count % 100 == 1 {
            let p = pose.position;
            let q = pose.rotation;
            println!(
                "object {}  pos=[{:+.3}, {:+.3}, {:+.3}]  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]  {:?}",
                object, p.x, p.y, p.z, q.x, q.y, q.z, q.w, pose.result
            );
        }
    }

    fn raw_poses(&mut self) -> Vec<HostPose> {
        // A headset standing still at head height.
        vec![HostPose {
            valid: true,
            position: glam::DVec3::new(0.0, 1.7, 0.0),
            ..HostPose::default()
        }]
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        None
    }

    fn update_scalar(&mut self, _object: ObjectId, _component: InputComponent, _value: f64) {}

    fn update_boolean(&mut self, _object: ObjectId, _component: InputComponent, _value: bool) {}
}

fn main() {
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "owo-bridge.toml".into());
    let mut config = match DriverConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    };
    if config.startup_ports.is_empty() {
        config.startup_ports.push(6969);
    }

    let mut driver = Driver::new(PrintingHost::default(), Box::new(UdpBinder), &config);
    println!(
        "Serving {} session(s), discovery {:?}",
        driver.registry().len(),
        config.discovery()
    );

    let frame = Duration::from_micros(11_111);
    loop {
        let start = Instant::now();
        driver.run_frame(start);
        if let Some(rest) = frame.checked_sub(start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
