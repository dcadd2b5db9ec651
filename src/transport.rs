use crate::Result;
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Non-blocking datagram socket as seen by a session.
///
/// `recv_from` returns `Ok(None)` once no datagram is waiting, which is how
/// every drain loop in the driver terminates.
pub trait DatagramSocket: Send {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<usize>;
}

/// Opens sockets for new sessions.
pub trait Binder {
    fn bind(&mut self, port: u16) -> Result<Box<dyn DatagramSocket>>;
}

impl DatagramSocket for UdpSocket {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match UdpSocket::recv_from(self, buf) {
            Ok((len, addr)) => Ok(Some((len, addr))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            // Windows reports ICMP port-unreachable from a previous send here.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(UdpSocket::send_to(self, buf, addr)?)
    }
}

/// Binds real UDP sockets on all interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpBinder;

impl Binder for UdpBinder {
    fn bind(&mut self, port: u16) -> Result<Box<dyn DatagramSocket>> {
        let socket = bind_udp(port)?;
        Ok(Box::new(socket))
    }
}

/// Bind a non-blocking UDP socket on `0.0.0.0:port`.
pub fn bind_udp(port: u16) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", port))?;
    socket.set_nonblocking(true)?;
    log::debug!("Bound UDP socket on port {}", port);
    Ok(socket)
}

/// In-memory sockets for tests and demos.
pub mod mock {
    use super::{Binder, DatagramSocket};
    use crate::{OwoError, Result};
    use crossbeam_channel::{Receiver, Sender};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    type Datagram = (Vec<u8>, SocketAddr);

    /// Socket half held by the driver.
    pub struct MockSocket {
        inbound: Receiver<Datagram>,
        outbound: Sender<Datagram>,
    }

    impl DatagramSocket for MockSocket {
        fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
            match self.inbound.try_recv() {
                Ok((data, addr)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(Some((len, addr)))
                }
                Err(_) => Ok(None),
            }
        }

        fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
            self.outbound
                .send((buf.to_vec(), addr))
                .map_err(|_| OwoError::Io(std::io::ErrorKind::BrokenPipe.into()))?;
            Ok(buf.len())
        }
    }

    /// Remote end of a [`MockSocket`], playing the phone.
    #[derive(Clone)]
    pub struct MockPeer {
        to_driver: Sender<Datagram>,
        from_driver: Receiver<Datagram>,
        addr: SocketAddr,
    }

    impl MockPeer {
        /// Deliver a datagram to the driver side.
        pub fn send(&self, data: &[u8]) {
            let _ = self.to_driver.send((data.to_vec(), self.addr));
        }

        /// Next datagram the driver sent, if any.
        pub fn recv(&self) -> Option<Vec<u8>> {
            self.from_driver.try_recv().ok().map(|(data, _)| data)
        }

        pub fn drain(&self) -> Vec<Vec<u8>> {
            std::iter::from_fn(|| self.recv()).collect()
        }
    }

    /// Connected socket pair with a fake peer address.
    pub fn pair(peer_addr: SocketAddr) -> (MockSocket, MockPeer) {
        let (to_driver, inbound) = crossbeam_channel::unbounded();
        let (outbound, from_driver) = crossbeam_channel::unbounded();
        (
            MockSocket { inbound, outbound },
            MockPeer {
                to_driver,
                from_driver,
                addr: peer_addr,
            },
        )
    }

    /// Binder that hands out mock sockets and remembers the peer for each
    /// port so tests can reach them.
    #[derive(Clone, Default)]
    pub struct MockBinder {
        peers: Arc<Mutex<HashMap<u16, MockPeer>>>,
        refused: Arc<Mutex<Vec<u16>>>,
    }

    impl MockBinder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Peer for the socket bound on `port`.
        pub fn peer(&self, port: u16) -> Option<MockPeer> {
            self.peers.lock().ok()?.get(&port).cloned()
        }

        /// Make future binds on `port` fail as if another process owned it.
        pub fn refuse(&self, port: u16) {
            if let Ok(mut refused) = self.refused.lock() {
                refused.push(port);
            }
        }
    }

    impl Binder for MockBinder {
        fn bind(&mut self, port: u16) -> Result<Box<dyn DatagramSocket>> {
            let refused = self
                .refused
                .lock()
                .map(|r| r.contains(&port))
                .unwrap_or(false);
            if refused {
                return Err(OwoError::Io(std::io::ErrorKind::AddrInUse.into()));
            }
            let addr = SocketAddr::from(([10, 0, 0, 2], port));
            let (socket, peer) = pair(addr);
            if let Ok(mut peers) = self.peers.lock() {
                peers.insert(port, peer);
            }
            Ok(Box::new(socket))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBinder;
    use super::*;

    #[test]
    fn test_mock_round_trip() {
        let mut binder = MockBinder::new();
        let mut socket = binder.bind(6969).unwrap();
        let peer = binder.peer(6969).unwrap();

        let mut buf = [0u8; 16];
        assert!(socket.recv_from(&mut buf).unwrap().is_none());

        peer.send(b"abc");
        let (len, addr) = socket.recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], b"abc");

        socket.send_to(b"xyz", addr).unwrap();
        assert_eq!(peer.recv().unwrap(), b"xyz");
    }

    #[test]
    fn test_mock_refused_port() {
        let mut binder = MockBinder::new();
        binder.refuse(7000);
        assert!(binder.bind(7000).is_err());
    }

    #[test]
    fn test_udp_drains_to_none() {
        let mut socket = bind_udp(0).unwrap();
        let mut buf = [0u8; 8];
        assert!(DatagramSocket::recv_from(&mut socket, &mut buf).unwrap().is_none());
    }
}
