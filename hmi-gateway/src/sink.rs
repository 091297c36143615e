//! Display sink channel
//!
//! Cross-thread delivery of signal updates, drive-mode text, and alarm
//! transitions to the UI collaborator. The publisher never blocks:
//! events go into an unbounded channel and a slow or dead consumer
//! cannot stall bus I/O. Delivery is FIFO, so updates for a single
//! signal name arrive in decode order.

use crossbeam_channel::{Receiver, Sender};

use crate::types::SignalValue;

/// An event published to the display sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// A subscribed signal changed
    Signal { name: String, value: SignalValue },
    /// Drive-mode text derived from the configured gear signal
    DriveMode(String),
    /// Alarm latch transition
    Alarm { active: bool, message: String },
    /// Bus connectivity changed
    BusState { connected: bool },
}

/// Create a sink channel: the gateway keeps the publisher, the UI
/// consumes the receiver.
pub fn sink_channel() -> (SinkPublisher, Receiver<SinkEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        SinkPublisher {
            tx,
            disconnected_logged: false,
        },
        rx,
    )
}

/// Fire-and-forget publisher side of the sink channel
pub struct SinkPublisher {
    tx: Sender<SinkEvent>,
    disconnected_logged: bool,
}

impl SinkPublisher {
    pub fn on_signal(&mut self, name: &str, value: SignalValue) {
        self.publish(SinkEvent::Signal {
            name: name.to_string(),
            value,
        });
    }

    pub fn on_drive_mode(&mut self, text: &str) {
        self.publish(SinkEvent::DriveMode(text.to_string()));
    }

    pub fn on_alarm(&mut self, active: bool, message: &str) {
        self.publish(SinkEvent::Alarm {
            active,
            message: message.to_string(),
        });
    }

    pub fn on_bus_state(&mut self, connected: bool) {
        self.publish(SinkEvent::BusState { connected });
    }

    fn publish(&mut self, event: SinkEvent) {
        if self.tx.send(event).is_err() && !self.disconnected_logged {
            // The UI went away; the gateway keeps running regardless
            log::warn!("Display sink disconnected, dropping further events");
            self.disconnected_logged = true;
        }
    }
}

impl Clone for SinkPublisher {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            disconnected_logged: false,
        }
    }
}
