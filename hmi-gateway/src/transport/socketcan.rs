//! SocketCAN transport for Linux native CAN interfaces
//!
//! Requires the interface to be configured first:
//!   sudo ip link set can0 up type can bitrate 500000
//!
//! Remote and error frames are skipped on receive; the gateway only
//! consumes data frames.

use std::io::ErrorKind;
use std::thread;
use std::time::Duration;

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};

use crate::transport::{BusTransport, TransportError};
use crate::types::Frame;

/// Largest valid 11-bit identifier
const MAX_STANDARD_ID: u32 = 0x7FF;

/// A SocketCAN endpoint
pub struct SocketCanTransport {
    socket: CanSocket,
    interface: String,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl SocketCanTransport {
    /// Open a socket on the given interface (e.g., "can0", "vcan0")
    pub fn open(interface: &str) -> Result<Self, TransportError> {
        let socket = CanSocket::open(interface).map_err(|e| TransportError::Open {
            interface: interface.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            socket,
            interface: interface.to_string(),
            read_timeout: None,
            write_timeout: None,
        })
    }

    fn apply_read_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.read_timeout != Some(timeout) {
            self.socket
                .set_read_timeout(timeout)
                .map_err(|e| TransportError::Receive(format!("set read timeout: {}", e)))?;
            self.read_timeout = Some(timeout);
        }
        Ok(())
    }

    fn apply_write_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.write_timeout != Some(timeout) {
            self.socket
                .set_write_timeout(timeout)
                .map_err(|e| TransportError::Send(format!("set write timeout: {}", e)))?;
            self.write_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl BusTransport for SocketCanTransport {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        self.apply_read_timeout(timeout)?;
        match self.socket.read_frame() {
            Ok(CanFrame::Data(frame)) => Ok(Some(Frame::new(
                raw_id(frame.id()),
                frame.data().to_vec(),
            ))),
            // Remote and error frames carry no decodable signals
            Ok(_) => Ok(None),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(TransportError::Receive(format!(
                "{}: {}",
                self.interface, e
            ))),
        }
    }

    fn send(&mut self, frame: &Frame, timeout: Duration) -> Result<(), TransportError> {
        self.apply_write_timeout(timeout)?;

        let id = if frame.id <= MAX_STANDARD_ID {
            let sid = StandardId::new(frame.id as u16).ok_or_else(|| {
                TransportError::Send(format!("invalid standard ID: 0x{:03X}", frame.id))
            })?;
            Id::Standard(sid)
        } else {
            let eid = ExtendedId::new(frame.id).ok_or_else(|| {
                TransportError::Send(format!("invalid extended ID: 0x{:08X}", frame.id))
            })?;
            Id::Extended(eid)
        };

        let can_frame = CanFrame::new(id, &frame.data)
            .ok_or_else(|| TransportError::Send(format!("invalid payload length {}", frame.dlc())))?;

        self.socket
            .write_frame(&can_frame)
            .map_err(|e| TransportError::Send(format!("{}: {}", self.interface, e)))
    }
}

fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(sid) => sid.as_raw() as u32,
        Id::Extended(eid) => eid.as_raw(),
    }
}

/// Open a SocketCAN endpoint, retrying transient failures at startup
///
/// After `attempts` failed tries the error is returned and the process
/// is expected to exit; transport unavailable at startup is fatal.
pub fn open_socketcan_with_retry(
    interface: &str,
    attempts: u32,
    delay: Duration,
) -> Result<SocketCanTransport, TransportError> {
    let mut last_err = TransportError::Open {
        interface: interface.to_string(),
        reason: "no attempts made".to_string(),
    };
    for attempt in 1..=attempts.max(1) {
        match SocketCanTransport::open(interface) {
            Ok(transport) => {
                log::info!("Opened CAN interface '{}' (attempt {})", interface, attempt);
                return Ok(transport);
            }
            Err(e) => {
                log::error!(
                    "Attempt {}/{} - failed to open CAN interface '{}': {}",
                    attempt,
                    attempts,
                    interface,
                    e
                );
                last_err = e;
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err)
}
