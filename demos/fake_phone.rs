//! Pretend to be a phone: stream a slowly turning orientation to a bridge.
//!
//! Usage: cargo run --example fake_phone [host:port]
//! Defaults to 127.0.0.1:6969.

use glam::{DQuat, DVec3};
use owo_bridge::protocol::{self, encode_packet, Packet};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let target = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:6969".into());
    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = socket.set_nonblocking(true) {
        eprintln!("Failed to set non-blocking: {}", e);
        std::process::exit(1);
    }

    println!("Sending to {} (Ctrl+C to stop)...", target);

    let start = Instant::now();
    let mut id: u64 = 0;
    let mut send = |packet: Packet| {
        id += 1;
        if let Err(e) = socket.send_to(&encode_packet(id, &packet), &target) {
            log::warn!("send failed: {}", e);
        }
    };

    send(Packet::Handshake);
    let mut buf = [0u8; protocol::MAX_PACKET_SIZE];
    loop {
        let t = start.elapsed().as_secs_f64();
        let yaw = (t * 0.5).sin();
        send(Packet::Rotation(DQuat::from_rotation_z(yaw)));
        send(Packet::Gyro(DVec3::new(0.0, 0.0, 0.5 * (t * 0.5).cos())));
        send(Packet::Accelerometer(DVec3::new(0.0, 0.0, 9.81)));

        while let Ok((len, from)) = socket.recv_from(&mut buf) {
            if buf[..len] == protocol::build_handshake_reply() {
                println!("Handshake reply from {}", from);
                continue;
            }
            match protocol::parse_kind(&buf[..len]) {
                Some(protocol::OUT_HEARTBEAT) => log::debug!("heartbeat from {}", from),
                Some(protocol::OUT_BUZZ) => println!("Buzz!"),
                _ => log::debug!("{} unknown bytes from {}", len, from),
            }
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}
