//! Ingress pipeline
//!
//! Owns a dedicated thread that blocks on transport receive, decodes
//! each frame through the signal database, normalizes values, and
//! publishes one update event per subscribed signal to the display
//! sink. The two alarm-warning signals are additionally forwarded to
//! the alarm latch's edge detector, and the configured drive-mode
//! signal is mirrored as human-readable text.
//!
//! Every failure during single-frame processing is contained at the
//! loop iteration: decode errors drop the frame, transport errors flag
//! the bus as degraded, and the loop runs until shutdown regardless.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::alarm::{AlarmLatch, WarningLevel};
use crate::codec::FrameCodec;
use crate::sink::SinkPublisher;
use crate::transport::BusTransport;
use crate::types::{DecodedSignal, Frame, GatewayError, SignalValue};

/// Ingress-side configuration, resolved by the gateway at startup
pub struct IngressParams {
    /// Signal names to publish
    pub subscribed: HashSet<String>,
    /// First-level warning signal name
    pub alarm_first: String,
    /// Second-level warning signal name
    pub alarm_second: String,
    /// Signal mirrored as drive-mode text (e.g., "ActETRS")
    pub drive_mode_signal: Option<String>,
    /// Transport receive timeout per iteration
    pub receive_timeout: Duration,
}

/// The ingress pipeline; `run` consumes it on its dedicated thread
pub struct IngressPipeline {
    transport: Box<dyn BusTransport>,
    codec: Arc<FrameCodec>,
    publisher: SinkPublisher,
    alarm: Arc<AlarmLatch>,
    running: Arc<AtomicBool>,
    params: IngressParams,
    /// Latest-value table; exclusively owned, observed only via events
    latest: HashMap<String, Option<SignalValue>>,
    bus_connected: bool,
}

impl IngressPipeline {
    pub fn new(
        transport: Box<dyn BusTransport>,
        codec: Arc<FrameCodec>,
        publisher: SinkPublisher,
        alarm: Arc<AlarmLatch>,
        running: Arc<AtomicBool>,
        params: IngressParams,
    ) -> Self {
        let latest = params
            .subscribed
            .iter()
            .map(|name| (name.clone(), None))
            .collect();
        Self {
            transport,
            codec,
            publisher,
            alarm,
            running,
            params,
            latest,
            bus_connected: true,
        }
    }

    /// Receive loop; returns when the shutdown flag clears
    pub fn run(mut self) {
        log::info!("Ingress pipeline started");
        while self.running.load(Ordering::Relaxed) {
            match self.transport.receive(self.params.receive_timeout) {
                // Timeout: nothing on the bus, not an error
                Ok(None) => self.note_bus_ok(),
                Ok(Some(frame)) => {
                    self.note_bus_ok();
                    self.process_frame(&frame);
                }
                Err(e) => {
                    log::error!("Error receiving from bus: {}", e);
                    if self.bus_connected {
                        self.bus_connected = false;
                        self.publisher.on_bus_state(false);
                    }
                    // Avoid spinning on a persistently failing socket
                    std::thread::sleep(self.params.receive_timeout);
                }
            }
        }
        log::info!("Ingress pipeline stopped");
    }

    fn note_bus_ok(&mut self) {
        if !self.bus_connected {
            self.bus_connected = true;
            self.publisher.on_bus_state(true);
        }
    }

    /// Decode one frame and publish its subscribed signals.
    ///
    /// Any error is logged and the frame dropped; the next frame is
    /// independent.
    fn process_frame(&mut self, frame: &Frame) {
        let decoded = match self.codec.decode(frame) {
            Ok(signals) => signals,
            // Unsubscribed traffic is routine; malformed payloads are not
            Err(GatewayError::MessageNotFound(id)) => {
                log::trace!("Dropping frame with unknown ID 0x{:X}", id);
                return;
            }
            Err(e) => {
                log::warn!("Error decoding frame 0x{:X}: {}", frame.id, e);
                return;
            }
        };

        for signal in &decoded {
            if !self.params.subscribed.contains(&signal.name) {
                continue;
            }

            let value = normalize(signal);
            self.latest
                .insert(signal.name.clone(), Some(value.clone()));
            self.publisher.on_signal(&signal.name, value);

            if signal.name == self.params.alarm_first {
                self.alarm.observe(WarningLevel::First, signal.raw_value != 0);
            } else if signal.name == self.params.alarm_second {
                self.alarm.observe(WarningLevel::Second, signal.raw_value != 0);
            }

            if self.params.drive_mode_signal.as_deref() == Some(signal.name.as_str()) {
                self.publisher.on_drive_mode(drive_mode_text(signal));
            }
        }
    }

    #[cfg(test)]
    fn latest_value(&self, name: &str) -> Option<&SignalValue> {
        self.latest.get(name).and_then(|v| v.as_ref())
    }
}

/// Normalize a decoded value for publication
///
/// Enumerations resolve to their underlying raw value and booleans to
/// 0/1 integers; floats pass through unchanged (zero-means-invalid
/// interpretation is a presentation concern, not the pipeline's).
fn normalize(signal: &DecodedSignal) -> SignalValue {
    match &signal.value {
        SignalValue::Enumerated(_) => SignalValue::Integer(signal.raw_value),
        SignalValue::Boolean(b) => SignalValue::Integer(if *b { 1 } else { 0 }),
        other => other.clone(),
    }
}

/// Drive-mode text from the value table, "Unknown" when unmapped
fn drive_mode_text(signal: &DecodedSignal) -> &str {
    match &signal.value {
        SignalValue::Enumerated(name) => name.as_str(),
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmMessages;
    use crate::signals::database::{
        ByteOrder, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
    };
    use crate::sink::{sink_channel, SinkEvent};
    use crate::transport::InMemoryTransport;
    use crossbeam_channel::Receiver;
    use std::collections::HashMap as StdHashMap;

    fn plain_signal(name: &str, start_bit: u16, length: u16) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: None,
            value_table: None,
        }
    }

    fn test_db() -> SignalDatabase {
        let mut db = SignalDatabase::new();

        let mut gear_table = StdHashMap::new();
        gear_table.insert(1, "Park".to_string());
        gear_table.insert(4, "Drive".to_string());
        let mut gear = plain_signal("ActETRS", 0, 3);
        gear.value_table = Some(gear_table);

        db.add_message(MessageDefinition {
            id: 0x200,
            name: "Gear_Status".to_string(),
            size: 8,
            sender: None,
            signals: vec![gear],
        });
        db.add_message(MessageDefinition {
            id: 0x300,
            name: "DMS_Warnings".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                plain_signal("Warning_First", 0, 1),
                plain_signal("Warning_Second", 1, 1),
            ],
        });
        db.add_message(MessageDefinition {
            id: 0x400,
            name: "Speeds".to_string(),
            size: 8,
            sender: None,
            signals: vec![plain_signal("WheelSpeed", 0, 16)],
        });
        db
    }

    fn test_pipeline() -> (
        IngressPipeline,
        Receiver<SinkEvent>,
        Arc<AtomicBool>,
        InMemoryTransport,
    ) {
        let codec = Arc::new(FrameCodec::new(Arc::new(test_db())));
        let (publisher, rx) = sink_channel();
        let alarm = Arc::new(AlarmLatch::new(AlarmMessages::default(), publisher.clone()));
        let running = Arc::new(AtomicBool::new(true));
        let (peer, transport) = InMemoryTransport::pair();

        let params = IngressParams {
            subscribed: [
                "ActETRS",
                "Warning_First",
                "Warning_Second",
                "WheelSpeed",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            alarm_first: "Warning_First".to_string(),
            alarm_second: "Warning_Second".to_string(),
            drive_mode_signal: Some("ActETRS".to_string()),
            receive_timeout: Duration::from_millis(10),
        };

        let pipeline = IngressPipeline::new(
            Box::new(transport),
            codec,
            publisher,
            alarm,
            running.clone(),
            params,
        );
        (pipeline, rx, running, peer)
    }

    #[test]
    fn test_latest_value_follows_arrival_order() {
        let (mut pipeline, rx, _running, _peer) = test_pipeline();

        pipeline.process_frame(&Frame::new(0x400, vec![0x10, 0x00, 0, 0, 0, 0, 0, 0]));
        pipeline.process_frame(&Frame::new(0x400, vec![0x20, 0x00, 0, 0, 0, 0, 0, 0]));
        pipeline.process_frame(&Frame::new(0x400, vec![0x30, 0x00, 0, 0, 0, 0, 0, 0]));

        assert_eq!(
            pipeline.latest_value("WheelSpeed"),
            Some(&SignalValue::Integer(0x30))
        );

        let published: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                SinkEvent::Signal { name, value } if name == "WheelSpeed" => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(
            published,
            vec![
                SignalValue::Integer(0x10),
                SignalValue::Integer(0x20),
                SignalValue::Integer(0x30)
            ]
        );
    }

    #[test]
    fn test_unknown_sentinel_before_first_reception() {
        let (pipeline, _rx, _running, _peer) = test_pipeline();
        assert_eq!(pipeline.latest_value("WheelSpeed"), None);
    }

    #[test]
    fn test_enumeration_normalizes_to_raw_and_publishes_drive_mode() {
        let (mut pipeline, rx, _running, _peer) = test_pipeline();

        pipeline.process_frame(&Frame::new(0x200, vec![0x04, 0, 0, 0, 0, 0, 0, 0]));

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&SinkEvent::Signal {
            name: "ActETRS".to_string(),
            value: SignalValue::Integer(4),
        }));
        assert!(events.contains(&SinkEvent::DriveMode("Drive".to_string())));
    }

    #[test]
    fn test_unmapped_gear_value_is_unknown() {
        let (mut pipeline, rx, _running, _peer) = test_pipeline();

        pipeline.process_frame(&Frame::new(0x200, vec![0x07, 0, 0, 0, 0, 0, 0, 0]));

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&SinkEvent::DriveMode("Unknown".to_string())));
    }

    #[test]
    fn test_same_frame_twice_publishes_twice_but_latches_once() {
        let (mut pipeline, rx, _running, _peer) = test_pipeline();

        let warning_on = Frame::new(0x300, vec![0x01, 0, 0, 0, 0, 0, 0, 0]);
        pipeline.process_frame(&warning_on);
        pipeline.process_frame(&warning_on);

        let events: Vec<_> = rx.try_iter().collect();
        let signal_updates = events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Signal { name, .. } if name == "Warning_First"))
            .count();
        let alerts = events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Alarm { active: true, .. }))
            .count();
        assert_eq!(signal_updates, 2, "value published per frame");
        assert_eq!(alerts, 1, "edge detection suppresses the second alert");
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let (mut pipeline, rx, _running, _peer) = test_pipeline();

        // Too short for WheelSpeed's 16 bits
        pipeline.process_frame(&Frame::new(0x400, vec![0x10]));
        // Unknown ID
        pipeline.process_frame(&Frame::new(0x7FF, vec![0; 8]));

        assert!(rx.try_iter().next().is_none());
        assert_eq!(pipeline.latest_value("WheelSpeed"), None);
    }

    #[test]
    fn test_quiet_bus_publishes_nothing_and_does_not_exit() {
        let (pipeline, rx, running, _peer) = test_pipeline();

        let handle = std::thread::spawn(move || pipeline.run());
        // 20 receive timeouts at 10 ms
        std::thread::sleep(Duration::from_millis(200));
        running.store(false, Ordering::Relaxed);
        handle.join().expect("ingress thread exits cleanly");

        assert!(rx.try_iter().next().is_none());
    }
}
