use crate::protocol::MAX_PACKET_SIZE;
use crate::registry::SessionRegistry;
use crate::transport::DatagramSocket;
use crate::Result;

/// Well-known port phones query to find open sessions.
pub const DISCOVERY_PORT: u16 = 35903;
pub const DISCOVERY_REQUEST: &[u8] = b"DISCOVERY";

/// Answers discovery queries with the list of live sessions.
pub struct DiscoveryServer {
    socket: Box<dyn DatagramSocket>,
}

impl DiscoveryServer {
    pub fn new(socket: Box<dyn DatagramSocket>) -> Self {
        Self { socket }
    }

    /// Drain pending queries and reply to each one.
    pub fn tick(&mut self, registry: &SessionRegistry) -> Result<()> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        while let Some((len, from)) = self.socket.recv_from(&mut buf)? {
            if !is_discovery_request(&buf[..len]) {
                log::trace!("Ignoring {}-byte datagram from {}", len, from);
                continue;
            }
            let response = registry.discovery_response();
            log::debug!("Discovery from {}: {} session(s)", from, registry.sessions().count());
            self.socket.send_to(response.as_bytes(), from)?;
        }
        Ok(())
    }
}

/// Content up to the first NUL must be exactly the request string.
fn is_discovery_request(data: &[u8]) -> bool {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    &data[..end] == DISCOVERY_REQUEST
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::transport::mock::{self, MockBinder};
    use crate::types::TrackerSettings;
    use std::net::SocketAddr;

    #[test]
    fn test_request_matching() {
        assert!(is_discovery_request(b"DISCOVERY"));
        assert!(is_discovery_request(b"DISCOVERY\0junk"));
        assert!(!is_discovery_request(b"DISCOVER"));
        assert!(!is_discovery_request(b"DISCOVERY!"));
    }

    #[test]
    fn test_replies_with_sessions() {
        let mut registry = SessionRegistry::new();
        let mut binder = MockBinder::new();
        let mut host = RecordingHost::new();
        registry
            .create(6969, &TrackerSettings::default(), &mut binder, &mut host)
            .unwrap();

        let (socket, peer) = mock::pair(SocketAddr::from(([10, 0, 0, 7], 40000)));
        let mut server = DiscoveryServer::new(Box::new(socket));
        peer.send(b"hello");
        peer.send(b"DISCOVERY\0");
        server.tick(&registry).unwrap();

        assert_eq!(peer.drain(), vec![b"6969:VIRT_TRACK00\n".to_vec()]);
    }
}
