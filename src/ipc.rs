//! Byte-message queue between the driver and an overlay UI.
//!
//! Messages are raw control-protocol buffers; framing is the fixed
//! message size itself, so the queue never re-frames anything.

use crate::control::{ControlRequest, ControlResponse, MESSAGE_SIZE};
use crate::{OwoError, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::time::Duration;

/// Driver side: polled once per frame.
pub struct DriverEndpoint {
    requests: Receiver<Vec<u8>>,
    responses: Sender<Vec<u8>>,
}

/// Overlay side: sends requests, waits for responses.
#[derive(Clone)]
pub struct OverlayEndpoint {
    requests: Sender<Vec<u8>>,
    responses: Receiver<Vec<u8>>,
}

/// Connected pair of bounded queues, `capacity` messages each way.
pub fn channel(capacity: usize) -> (DriverEndpoint, OverlayEndpoint) {
    let (req_tx, req_rx) = crossbeam_channel::bounded(capacity);
    let (resp_tx, resp_rx) = crossbeam_channel::bounded(capacity);
    (
        DriverEndpoint {
            requests: req_rx,
            responses: resp_tx,
        },
        OverlayEndpoint {
            requests: req_tx,
            responses: resp_rx,
        },
    )
}

fn send_bytes(tx: &Sender<Vec<u8>>, bytes: Vec<u8>) -> Result<()> {
    tx.try_send(bytes).map_err(|e| match e {
        TrySendError::Full(_) => OwoError::Timeout,
        TrySendError::Disconnected(_) => OwoError::ChannelDisconnected,
    })
}

impl DriverEndpoint {
    /// Next pending request, if any.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.requests.try_recv().ok()
    }

    pub fn send(&self, message: [u8; MESSAGE_SIZE]) -> Result<()> {
        send_bytes(&self.responses, message.to_vec())
    }
}

impl OverlayEndpoint {
    pub fn request(&self, request: &ControlRequest) -> Result<()> {
        send_bytes(&self.requests, request.encode().to_vec())
    }

    /// Queue arbitrary bytes, well-formed or not.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        send_bytes(&self.requests, bytes.to_vec())
    }

    /// Next decoded response without blocking. Malformed responses are
    /// skipped.
    pub fn try_response(&self) -> Option<ControlResponse> {
        while let Ok(bytes) = self.responses.try_recv() {
            match ControlResponse::decode(&bytes) {
                Ok(response) => return Some(response),
                Err(e) => log::warn!("Dropping control response: {}", e),
            }
        }
        None
    }

    pub fn recv_response_timeout(&self, timeout: Duration) -> Result<ControlResponse> {
        let bytes = self.responses.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => OwoError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => OwoError::ChannelDisconnected,
        })?;
        ControlResponse::decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_reaches_driver() {
        let (driver, overlay) = channel(4);
        overlay.request(&ControlRequest::GetVersion).unwrap();
        let bytes = driver.try_recv().unwrap();
        assert_eq!(ControlRequest::decode(&bytes).unwrap(), ControlRequest::GetVersion);
        assert!(driver.try_recv().is_none());
    }

    #[test]
    fn test_response_reaches_overlay() {
        let (driver, overlay) = channel(4);
        driver.send(ControlResponse::Version(8).encode()).unwrap();
        assert_eq!(
            overlay.recv_response_timeout(Duration::from_millis(10)).unwrap(),
            ControlResponse::Version(8)
        );
        assert!(matches!(
            overlay.recv_response_timeout(Duration::from_millis(1)),
            Err(OwoError::Timeout)
        ));
    }

    #[test]
    fn test_full_queue_reports_error() {
        let (_driver, overlay) = channel(1);
        overlay.request(&ControlRequest::GetVersion).unwrap();
        assert!(overlay.request(&ControlRequest::GetVersion).is_err());
    }

    #[test]
    fn test_disconnected() {
        let (driver, overlay) = channel(1);
        drop(overlay);
        assert!(matches!(
            driver.send(ControlResponse::Version(8).encode()),
            Err(OwoError::ChannelDisconnected)
        ));
    }
}
