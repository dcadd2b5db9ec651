use crate::liveness::Liveness;
use crate::protocol::{self, Packet, SequenceGate, MAX_PACKET_SIZE};
use crate::transport::DatagramSocket;
use crate::types::Sample;
use crate::Result;
use std::net::SocketAddr;
use std::time::Instant;

/// Ticks between keep-alives sent to the phone.
pub const HEARTBEAT_INTERVAL_TICKS: u32 = 500;

/// Per-session sensor endpoint: owns the socket and everything decoded
/// from it.
pub struct SensorLink {
    socket: Box<dyn DatagramSocket>,
    port: u16,
    gate: SequenceGate,
    sample: Sample,
    new_data: bool,
    liveness: Liveness,
    peer: Option<SocketAddr>,
    heartbeat_ticks: u32,
}

impl SensorLink {
    pub fn new(socket: Box<dyn DatagramSocket>, port: u16) -> Self {
        Self {
            socket,
            port,
            gate: SequenceGate::new(),
            sample: Sample::default(),
            new_data: false,
            liveness: Liveness::new(),
            peer: None,
            heartbeat_ticks: 0,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Emit a heartbeat if due, then drain every waiting datagram.
    ///
    /// Stops at the first socket error; packets decoded before it are kept.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        self.send_heartbeat(now)?;

        let mut buf = [0u8; MAX_PACKET_SIZE];
        while let Some((len, from)) = self.socket.recv_from(&mut buf)? {
            self.peer = Some(from);
            self.handle_datagram(&buf[..len], now)?;
        }
        Ok(())
    }

    fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Result<()> {
        let Some(frame) = protocol::parse_packet(data) else {
            log::trace!("Port {}: dropped {}-byte datagram", self.port, data.len());
            return Ok(());
        };
        if !self.gate.accept(frame.id) {
            log::trace!(
                "Port {}: stale packet {} (current {})",
                self.port,
                frame.id,
                self.gate.current_id()
            );
            return Ok(());
        }

        self.liveness.touch(now);

        match frame.packet {
            Packet::Heartbeat => {}
            Packet::Handshake => {
                if let Some(peer) = self.peer {
                    log::info!("Port {}: handshake from {}", self.port, peer);
                    self.socket.send_to(&protocol::build_handshake_reply(), peer)?;
                }
            }
            Packet::Rotation(q) => {
                self.sample.rotation = q;
                self.new_data = true;
            }
            Packet::Gyro(v) => {
                self.sample.gyro = v;
                self.new_data = true;
            }
            Packet::Accelerometer(v) => {
                self.sample.accel = v;
                self.new_data = true;
            }
        }
        Ok(())
    }

    fn send_heartbeat(&mut self, now: Instant) -> Result<()> {
        self.heartbeat_ticks += 1;
        if self.heartbeat_ticks <= HEARTBEAT_INTERVAL_TICKS {
            return Ok(());
        }
        self.heartbeat_ticks = 0;

        if !self.liveness.is_alive(now) {
            return Ok(());
        }
        if let Some(peer) = self.peer {
            self.socket.send_to(&protocol::build_heartbeat(), peer)?;
        }
        Ok(())
    }

    /// Forward a haptic request to the phone.
    pub fn buzz(&mut self, duration_s: f32, frequency: f32, amplitude: f32) -> Result<()> {
        match self.peer {
            Some(peer) => {
                self.socket
                    .send_to(&protocol::build_buzz(duration_s, frequency, amplitude), peer)?;
            }
            None => log::debug!("Port {}: buzz dropped, no peer yet", self.port),
        }
        Ok(())
    }

    /// Returns true once per batch of new sensor data.
    pub fn take_new_data(&mut self) -> bool {
        std::mem::take(&mut self.new_data)
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn is_alive(&mut self, now: Instant) -> bool {
        self.liveness.is_alive(now)
    }

    pub fn current_id(&self) -> u64 {
        self.gate.current_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_packet;
    use crate::transport::mock::{self, MockPeer};
    use glam::{DQuat, DVec3};
    use std::time::Duration;

    fn link() -> (SensorLink, MockPeer) {
        let (socket, peer) = mock::pair(SocketAddr::from(([10, 0, 0, 9], 5000)));
        (SensorLink::new(Box::new(socket), 6969), peer)
    }

    #[test]
    fn test_rotation_updates_sample() {
        let (mut link, peer) = link();
        let now = Instant::now();
        let q = DQuat::from_xyzw(0.0, 0.5, 0.0, 0.5);
        peer.send(&encode_packet(10, &Packet::Rotation(q)));
        link.tick(now).unwrap();

        assert!(link.take_new_data());
        assert!(!link.take_new_data());
        assert_eq!(link.sample().rotation, q);
        assert_eq!(link.current_id(), 10);
        assert!(link.is_alive(now));
    }

    #[test]
    fn test_duplicate_does_not_alter_sample() {
        let (mut link, peer) = link();
        let now = Instant::now();
        peer.send(&encode_packet(10, &Packet::Gyro(DVec3::new(1.0, 2.0, 3.0))));
        link.tick(now).unwrap();
        link.take_new_data();

        peer.send(&encode_packet(10, &Packet::Gyro(DVec3::new(9.0, 9.0, 9.0))));
        peer.send(&encode_packet(7, &Packet::Accelerometer(DVec3::new(9.0, 9.0, 9.0))));
        link.tick(now).unwrap();

        assert!(!link.take_new_data());
        assert_eq!(link.sample().gyro, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(link.sample().accel, DVec3::ZERO);
    }

    #[test]
    fn test_restart_is_accepted() {
        let (mut link, peer) = link();
        let now = Instant::now();
        peer.send(&encode_packet(500, &Packet::Heartbeat));
        peer.send(&encode_packet(1, &Packet::Gyro(DVec3::X)));
        link.tick(now).unwrap();
        assert_eq!(link.current_id(), 1);
        assert_eq!(link.sample().gyro, DVec3::X);
    }

    #[test]
    fn test_handshake_gets_reply() {
        let (mut link, peer) = link();
        peer.send(&encode_packet(0, &Packet::Handshake));
        link.tick(Instant::now()).unwrap();
        assert_eq!(peer.recv().unwrap(), protocol::build_handshake_reply().to_vec());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let (mut link, peer) = link();
        let now = Instant::now();
        peer.send(&[1, 2, 3]);
        peer.send(&encode_packet(3, &Packet::Heartbeat)[..8]);
        link.tick(now).unwrap();
        assert!(!link.take_new_data());
        assert!(!link.is_alive(now));
    }

    #[test]
    fn test_heartbeat_only_while_alive() {
        let (mut link, peer) = link();
        let t0 = Instant::now();
        peer.send(&encode_packet(1, &Packet::Heartbeat));
        for _ in 0..=HEARTBEAT_INTERVAL_TICKS {
            link.tick(t0).unwrap();
        }
        assert_eq!(peer.drain(), vec![protocol::build_heartbeat().to_vec()]);

        let late = t0 + Duration::from_secs(10);
        for _ in 0..=HEARTBEAT_INTERVAL_TICKS {
            link.tick(late).unwrap();
        }
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_buzz_reaches_peer() {
        let (mut link, peer) = link();
        link.buzz(0.1, 1.0, 1.0).unwrap();
        assert!(peer.recv().is_none());

        peer.send(&encode_packet(1, &Packet::Heartbeat));
        link.tick(Instant::now()).unwrap();
        link.buzz(0.1, 1.0, 1.0).unwrap();
        assert_eq!(peer.recv().unwrap(), protocol::build_buzz(0.1, 1.0, 1.0).to_vec());
    }
}
