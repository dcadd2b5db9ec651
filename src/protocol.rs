use glam::{DQuat, DVec3};

// -- Inbound message kinds (phone to driver) --
pub const MSG_HEARTBEAT: u32 = 0;
pub const MSG_ROTATION: u32 = 1;
pub const MSG_GYRO: u32 = 2;
pub const MSG_HANDSHAKE: u32 = 3;
pub const MSG_ACCELEROMETER: u32 = 4;

// -- Outbound message kinds (driver to phone) --
/// Keep-alive; shares the inbound heartbeat tag.
pub const OUT_HEARTBEAT: u32 = MSG_HEARTBEAT;
pub const OUT_BUZZ: u32 = 2;

// -- Packet geometry --
/// Kind tag (u32) + packet id (u64).
pub const HEADER_SIZE: usize = 4 + 8;
pub const MAX_PACKET_SIZE: usize = 256;
const FLOAT_SIZE: usize = 4;

/// Ids below this are always accepted so a restarted phone can resync.
pub const SEQUENCE_RESET_WINDOW: u64 = 5;

/// Canned handshake reply; byte 0 is overwritten with [`MSG_HANDSHAKE`].
const HELLO_MESSAGE: &[u8; 14] = b" Hey OVR =D 5\0";

/// A decoded inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Heartbeat,
    Rotation(DQuat),
    Gyro(DVec3),
    Accelerometer(DVec3),
    Handshake,
}

/// Packet together with its monotonic id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub id: u64,
    pub packet: Packet,
}

/// Read `N` big-endian wire floats starting at `offset`, widened to f64.
fn read_floats<const N: usize>(data: &[u8], offset: usize) -> Option<[f64; N]> {
    if data.len() < offset + N * FLOAT_SIZE {
        return None;
    }
    let mut out = [0.0; N];
    for (i, v) in out.iter_mut().enumerate() {
        let at = offset + i * FLOAT_SIZE;
        *v = f32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as f64;
    }
    Some(out)
}

/// Read the message kind tag. Needs only the first four bytes.
pub fn parse_kind(data: &[u8]) -> Option<u32> {
    let tag = data.get(..4)?;
    Some(u32::from_be_bytes([tag[0], tag[1], tag[2], tag[3]]))
}

/// Parse one datagram into a [`Frame`].
///
/// Layout (big-endian):
/// - `[0..4]`: u32 message kind
/// - `[4..12]`: u64 packet id
/// - `[12..]`: payload, 4 floats for rotation (x, y, z, w), 3 for gyro and accel
///
/// Returns `None` for short buffers and unknown kinds; both are dropped by
/// the caller without touching session state.
pub fn parse_packet(data: &[u8]) -> Option<Frame> {
    if data.len() < HEADER_SIZE || data.len() > MAX_PACKET_SIZE {
        return None;
    }
    let kind = parse_kind(data)?;
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&data[4..HEADER_SIZE]);
    let id = u64::from_be_bytes(id_bytes);

    let packet = match kind {
        MSG_HEARTBEAT => Packet::Heartbeat,
        MSG_HANDSHAKE => Packet::Handshake,
        MSG_ROTATION => {
            let [x, y, z, w] = read_floats::<4>(data, HEADER_SIZE)?;
            Packet::Rotation(DQuat::from_xyzw(x, y, z, w))
        }
        MSG_GYRO => Packet::Gyro(DVec3::from_array(read_floats::<3>(data, HEADER_SIZE)?)),
        MSG_ACCELEROMETER => {
            Packet::Accelerometer(DVec3::from_array(read_floats::<3>(data, HEADER_SIZE)?))
        }
        _ => return None,
    };

    Some(Frame { id, packet })
}

/// Tracks the last accepted packet id for one session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceGate {
    current_id: u64,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `id` if it is newer than the last one, or small enough to be a
    /// sender restart. Accepted ids become the new current id.
    pub fn accept(&mut self, id: u64) -> bool {
        if id > self.current_id || id < SEQUENCE_RESET_WINDOW {
            self.current_id = id;
            true
        } else {
            false
        }
    }

    pub fn current_id(&self) -> u64 {
        self.current_id
    }
}

/// Build the reply sent back to a phone's handshake.
pub fn build_handshake_reply() -> [u8; 14] {
    let mut buf = *HELLO_MESSAGE;
    buf[0] = MSG_HANDSHAKE as u8;
    buf
}

/// Build the 8-byte keep-alive sent to a live phone.
pub fn build_heartbeat() -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&OUT_HEARTBEAT.to_be_bytes());
    buf
}

/// Build a vibration request: `[u32 kind][f32 duration][f32 frequency][f32 amplitude]`.
pub fn build_buzz(duration_s: f32, frequency: f32, amplitude: f32) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0..4].copy_from_slice(&OUT_BUZZ.to_be_bytes());
    buf[4..8].copy_from_slice(&duration_s.to_be_bytes());
    buf[8..12].copy_from_slice(&frequency.to_be_bytes());
    buf[12..16].copy_from_slice(&amplitude.to_be_bytes());
    buf
}

/// Encode an inbound packet the way the phone app does. Used by tests and
/// the fake-phone demo.
pub fn encode_packet(id: u64, packet: &Packet) -> Vec<u8> {
    let (kind, floats): (u32, Vec<f32>) = match packet {
        Packet::Heartbeat => (MSG_HEARTBEAT, Vec::new()),
        Packet::Handshake => (MSG_HANDSHAKE, Vec::new()),
        Packet::Rotation(q) => (MSG_ROTATION, vec![q.x as f32, q.y as f32, q.z as f32, q.w as f32]),
        Packet::Gyro(v) => (MSG_GYRO, vec![v.x as f32, v.y as f32, v.z as f32]),
        Packet::Accelerometer(v) => (MSG_ACCELEROMETER, vec![v.x as f32, v.y as f32, v.z as f32]),
    };
    let mut buf = Vec::with_capacity(HEADER_SIZE + floats.len() * FLOAT_SIZE);
    buf.extend_from_slice(&kind.to_be_bytes());
    buf.extend_from_slice(&id.to_be_bytes());
    for f in floats {
        buf.extend_from_slice(&f.to_be_bytes());
    }
    buf
}
