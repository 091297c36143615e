//! Bus transport
//!
//! A duplex channel to the vehicle bus: blocking receive-with-timeout
//! and send-with-timeout over raw frames. A receive timeout is a
//! normal outcome (`Ok(None)`), not an error; transient failures are
//! reported so the callers can retry at their own loop boundaries.
//!
//! Ingress and egress each own their endpoint. For SocketCAN that
//! means two sockets on the same interface; both directions then
//! proceed independently and closing happens on drop, after the owning
//! thread has observed shutdown and returned.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::types::Frame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use self::socketcan::{open_socketcan_with_retry, SocketCanTransport};

/// Errors from the bus transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open bus interface '{interface}': {reason}")]
    Open { interface: String, reason: String },

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Bus transport is closed")]
    Closed,
}

/// A duplex vehicle-bus endpoint
pub trait BusTransport: Send {
    /// Receive one frame, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no frame arrived in time.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError>;

    /// Send one frame, waiting at most `timeout` for bus access.
    fn send(&mut self, frame: &Frame, timeout: Duration) -> Result<(), TransportError>;
}

/// An in-memory bus endpoint
///
/// `pair()` cross-connects two endpoints: whatever one side sends, the
/// other receives. Backs the test suite and the CLI's virtual-bus mode.
pub struct InMemoryTransport {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl InMemoryTransport {
    /// Create two cross-connected endpoints
    pub fn pair() -> (InMemoryTransport, InMemoryTransport) {
        let (a_tx, a_rx) = crossbeam_channel::unbounded();
        let (b_tx, b_rx) = crossbeam_channel::unbounded();
        (
            InMemoryTransport { tx: a_tx, rx: b_rx },
            InMemoryTransport { tx: b_tx, rx: a_rx },
        )
    }
}

impl BusTransport for InMemoryTransport {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn send(&mut self, frame: &Frame, _timeout: Duration) -> Result<(), TransportError> {
        self.tx
            .send(frame.clone())
            .map_err(|_| TransportError::Closed)
    }
}
