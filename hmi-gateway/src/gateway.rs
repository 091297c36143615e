//! Gateway lifecycle
//!
//! Wires the signal database, codec, intent store, alarm latch, and
//! the two worker threads together. The gateway owns the shutdown
//! flag; `shutdown` clears it and joins both threads.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Deserialize;

use crate::alarm::{AlarmLatch, AlarmMessages, AlarmSnapshot};
use crate::codec::FrameCodec;
use crate::egress::{EgressParams, EgressScheduler};
use crate::ingress::{IngressParams, IngressPipeline};
use crate::intents::IntentStore;
use crate::signals::database::SignalDatabase;
use crate::sink::SinkPublisher;
use crate::transport::BusTransport;
use crate::types::Result;

/// Top-level gateway configuration, loadable from a TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bus interface name
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Path to the DBC file describing the bus
    #[serde(default = "default_dbc_path")]
    pub dbc_path: PathBuf,

    /// Signal names to decode and publish to the display sink
    #[serde(default)]
    pub subscribe: Vec<String>,

    /// Transport receive timeout per ingress iteration, in milliseconds
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// Bus open attempts before startup fails
    #[serde(default = "default_open_retries")]
    pub open_retries: u32,

    /// Delay between bus open attempts, in milliseconds
    #[serde(default = "default_open_backoff_ms")]
    pub open_backoff_ms: u64,

    #[serde(default)]
    pub transmit: TransmitConfig,

    #[serde(default)]
    pub alarm: AlarmConfig,

    /// Signal mirrored as drive-mode text, or none to disable
    #[serde(default = "default_drive_mode_signal")]
    pub drive_mode_signal: Option<String>,
}

/// Outbound frame configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransmitConfig {
    /// Frame identifier carrying all intents
    #[serde(default = "default_tx_frame_id")]
    pub frame_id: u32,

    /// Intent signal names; all must be signals of `frame_id`
    #[serde(default = "default_intents")]
    pub intents: Vec<String>,

    /// Transmit cycle period, in milliseconds
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,

    /// Send attempts per cycle
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff between send attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Transport send timeout per attempt, in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

/// Warning signal binding and alert texts
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlarmConfig {
    #[serde(default = "default_alarm_first_signal")]
    pub first_signal: String,

    #[serde(default = "default_alarm_second_signal")]
    pub second_signal: String,

    #[serde(default = "default_alarm_first_message")]
    pub first_message: String,

    #[serde(default = "default_alarm_second_message")]
    pub second_message: String,
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_dbc_path() -> PathBuf {
    PathBuf::from("vehicle.dbc")
}

fn default_receive_timeout_ms() -> u64 {
    100
}

fn default_open_retries() -> u32 {
    3
}

fn default_open_backoff_ms() -> u64 {
    1000
}

fn default_tx_frame_id() -> u32 {
    0x519
}

fn default_intents() -> Vec<String> {
    vec![
        "Dyno_mode_req_team".to_string(),
        "AIN_engaged".to_string(),
        "DMS_engage".to_string(),
    ]
}

fn default_cycle_ms() -> u64 {
    500
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_send_timeout_ms() -> u64 {
    200
}

fn default_alarm_first_signal() -> String {
    "Warning_First".to_string()
}

fn default_alarm_second_signal() -> String {
    "Warning_Second".to_string()
}

fn default_alarm_first_message() -> String {
    AlarmMessages::default().first
}

fn default_alarm_second_message() -> String {
    AlarmMessages::default().second
}

fn default_drive_mode_signal() -> Option<String> {
    Some("ActETRS".to_string())
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            dbc_path: default_dbc_path(),
            subscribe: Vec::new(),
            receive_timeout_ms: default_receive_timeout_ms(),
            open_retries: default_open_retries(),
            open_backoff_ms: default_open_backoff_ms(),
            transmit: TransmitConfig::default(),
            alarm: AlarmConfig::default(),
            drive_mode_signal: default_drive_mode_signal(),
        }
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            frame_id: default_tx_frame_id(),
            intents: default_intents(),
            cycle_ms: default_cycle_ms(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            first_signal: default_alarm_first_signal(),
            second_signal: default_alarm_second_signal(),
            first_message: default_alarm_first_message(),
            second_message: default_alarm_second_message(),
        }
    }
}

/// A running gateway: two worker threads plus the shared state the
/// UI thread touches
pub struct Gateway {
    running: Arc<AtomicBool>,
    intents: Arc<IntentStore>,
    alarm: Arc<AlarmLatch>,
    ingress_handle: JoinHandle<()>,
    egress_handle: JoinHandle<()>,
}

impl Gateway {
    /// Validate the configuration against the database and spawn the
    /// ingress and egress threads.
    ///
    /// Each thread owns its own transport endpoint; on a real bus the
    /// two endpoints are separate sockets on the same interface.
    pub fn start(
        config: &GatewayConfig,
        database: Arc<SignalDatabase>,
        rx_transport: Box<dyn BusTransport>,
        tx_transport: Box<dyn BusTransport>,
        publisher: SinkPublisher,
    ) -> Result<Self> {
        // Fail at startup, not on the first send
        database.validate_frame_signals(config.transmit.frame_id, &config.transmit.intents)?;

        let codec = Arc::new(FrameCodec::new(database.clone()));
        let running = Arc::new(AtomicBool::new(true));
        let intents = Arc::new(IntentStore::new(config.transmit.intents.iter().cloned()));
        let alarm = Arc::new(AlarmLatch::new(
            AlarmMessages {
                first: config.alarm.first_message.clone(),
                second: config.alarm.second_message.clone(),
            },
            publisher.clone(),
        ));

        // Alarm and drive-mode signals are decoded even if the config
        // forgot to subscribe to them.
        let mut subscribed: HashSet<String> = config.subscribe.iter().cloned().collect();
        subscribed.insert(config.alarm.first_signal.clone());
        subscribed.insert(config.alarm.second_signal.clone());
        if let Some(name) = &config.drive_mode_signal {
            subscribed.insert(name.clone());
        }

        // A subscription no frame carries can never publish; say so at
        // startup instead of staying silent forever.
        for name in &subscribed {
            if database.frame_for_signal(name).is_none() {
                log::warn!("Subscribed signal '{}' is not in the signal database", name);
            }
        }

        let ingress = IngressPipeline::new(
            rx_transport,
            codec.clone(),
            publisher,
            alarm.clone(),
            running.clone(),
            IngressParams {
                subscribed,
                alarm_first: config.alarm.first_signal.clone(),
                alarm_second: config.alarm.second_signal.clone(),
                drive_mode_signal: config.drive_mode_signal.clone(),
                receive_timeout: Duration::from_millis(config.receive_timeout_ms),
            },
        );

        let egress = EgressScheduler::new(
            tx_transport,
            codec,
            intents.clone(),
            running.clone(),
            EgressParams {
                frame_id: config.transmit.frame_id,
                cycle: Duration::from_millis(config.transmit.cycle_ms),
                retries: config.transmit.retries,
                retry_backoff: Duration::from_millis(config.transmit.retry_backoff_ms),
                send_timeout: Duration::from_millis(config.transmit.send_timeout_ms),
            },
        );

        let ingress_handle = std::thread::Builder::new()
            .name("hmi-ingress".to_string())
            .spawn(move || ingress.run())?;
        let egress_handle = std::thread::Builder::new()
            .name("hmi-egress".to_string())
            .spawn(move || egress.run())?;

        log::info!("Gateway started on interface {}", config.interface);
        Ok(Self {
            running,
            intents,
            alarm,
            ingress_handle,
            egress_handle,
        })
    }

    /// Set a driver intent; callable from any thread
    pub fn set_intent(&self, name: &str, active: bool) {
        self.intents.set(name, active);
    }

    /// Current intent values
    pub fn intents(&self) -> std::collections::BTreeMap<String, bool> {
        self.intents.snapshot()
    }

    /// Consistent view of the alarm latch
    pub fn alarm_snapshot(&self) -> AlarmSnapshot {
        self.alarm.snapshot()
    }

    /// Signal both workers to stop and wait for them to exit.
    ///
    /// Worst-case latency is one receive timeout plus one transmit
    /// cycle.
    pub fn shutdown(self) {
        log::info!("Gateway shutting down");
        self.running.store(false, Ordering::Relaxed);
        if self.ingress_handle.join().is_err() {
            log::error!("Ingress thread panicked");
        }
        if self.egress_handle.join().is_err() {
            log::error!("Egress thread panicked");
        }
        log::info!("Gateway stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::{
        ByteOrder, MessageDefinition, SignalDefinition, ValueType,
    };
    use crate::sink::sink_channel;
    use crate::transport::InMemoryTransport;
    use crate::types::GatewayError;

    fn intent_signal(name: &str, start_bit: u16) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length: 1,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 1.0,
            unit: None,
            value_table: None,
        }
    }

    fn test_db() -> Arc<SignalDatabase> {
        let mut db = SignalDatabase::new();
        db.add_message(MessageDefinition {
            id: 0x519,
            name: "HMI_Request".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                intent_signal("Dyno_mode_req_team", 0),
                intent_signal("AIN_engaged", 1),
                intent_signal("DMS_engage", 2),
            ],
        });
        db.add_message(MessageDefinition {
            id: 0x300,
            name: "DMS_Warnings".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                intent_signal("Warning_First", 0),
                intent_signal("Warning_Second", 1),
            ],
        });
        Arc::new(db)
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.interface, "can0");
        assert_eq!(config.transmit.frame_id, 0x519);
        assert_eq!(config.transmit.cycle_ms, 500);
        assert_eq!(config.transmit.retries, 3);
        assert_eq!(config.transmit.retry_backoff_ms, 200);
        assert_eq!(config.receive_timeout_ms, 100);
        assert_eq!(config.alarm.first_signal, "Warning_First");
        assert_eq!(config.drive_mode_signal.as_deref(), Some("ActETRS"));
        assert_eq!(
            config.transmit.intents,
            vec!["Dyno_mode_req_team", "AIN_engaged", "DMS_engage"]
        );
    }

    #[test]
    fn test_start_rejects_unknown_intent() {
        let mut config = GatewayConfig::default();
        config.drive_mode_signal = None;
        config.transmit.intents.push("Not_A_Signal".to_string());

        let (_rx_peer, rx_transport) = InMemoryTransport::pair();
        let (_tx_peer, tx_transport) = InMemoryTransport::pair();
        let (publisher, _events) = sink_channel();

        let err = Gateway::start(
            &config,
            test_db(),
            Box::new(rx_transport),
            Box::new(tx_transport),
            publisher,
        )
        .err()
        .expect("startup must reject an intent outside the frame");
        assert!(matches!(err, GatewayError::SignalNotInFrame { .. }));
    }

    #[test]
    fn test_unknown_subscription_is_not_fatal() {
        // A subscription outside the database is warned about at
        // startup but must not keep the gateway from running.
        let mut config = GatewayConfig::default();
        config.drive_mode_signal = None;
        config.receive_timeout_ms = 10;
        config.transmit.cycle_ms = 20;
        config.subscribe = vec!["Not_In_Any_Frame".to_string()];

        let (_rx_peer, rx_transport) = InMemoryTransport::pair();
        let (_tx_peer, tx_transport) = InMemoryTransport::pair();
        let (publisher, _events) = sink_channel();

        let gateway = Gateway::start(
            &config,
            test_db(),
            Box::new(rx_transport),
            Box::new(tx_transport),
            publisher,
        )
        .expect("unknown subscription is log-only");
        gateway.shutdown();
    }

    #[test]
    fn test_start_and_shutdown() {
        let mut config = GatewayConfig::default();
        config.drive_mode_signal = None;
        config.receive_timeout_ms = 10;
        config.transmit.cycle_ms = 20;

        let (_rx_peer, rx_transport) = InMemoryTransport::pair();
        let (_tx_peer, tx_transport) = InMemoryTransport::pair();
        let (publisher, _events) = sink_channel();

        let gateway = Gateway::start(
            &config,
            test_db(),
            Box::new(rx_transport),
            Box::new(tx_transport),
            publisher,
        )
        .expect("gateway starts");

        gateway.set_intent("DMS_engage", true);
        assert_eq!(gateway.intents()["DMS_engage"], true);
        assert!(!gateway.alarm_snapshot().active);

        gateway.shutdown();
    }
}
