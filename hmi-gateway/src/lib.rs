//! HMI CAN Gateway Library
//!
//! The bus-facing core of a vehicle dashboard: decodes subscribed
//! signals from an ingress socket, latches driver-monitoring warnings,
//! and periodically transmits driver intents on a single outbound
//! frame.
//!
//! # Architecture
//!
//! - Signal database: message and signal definitions loaded from a DBC
//!   file, including value tables
//! - Frame codec: raw payload bytes to physical values and back
//! - Bus transport: a narrow send/receive trait with a SocketCAN
//!   implementation (Linux) and an in-memory loopback for tests
//! - Ingress pipeline: dedicated receive thread publishing signal
//!   updates to the display sink
//! - Intent store and egress scheduler: driver requests collected from
//!   the UI thread and sent on a fixed cadence with bounded retry
//! - Alarm latch: edge-detected two-level warning state
//!
//! The library does NOT render anything: the display sink is a channel
//! of events, and whatever UI sits on the other end is the
//! application's concern (hmi-gateway-cli ships a console one).
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use hmi_gateway::{Gateway, GatewayConfig, SignalDatabase};
//! use hmi_gateway::sink::sink_channel;
//! use hmi_gateway::transport::InMemoryTransport;
//!
//! let config = GatewayConfig::default();
//! let database = Arc::new(SignalDatabase::from_dbc_file(&config.dbc_path).unwrap());
//! let (publisher, events) = sink_channel();
//! let (_rx_peer, rx) = InMemoryTransport::pair();
//! let (_tx_peer, tx) = InMemoryTransport::pair();
//!
//! let gateway =
//!     Gateway::start(&config, database, Box::new(rx), Box::new(tx), publisher).unwrap();
//! gateway.set_intent("DMS_engage", true);
//! for event in events.try_iter() {
//!     println!("{:?}", event);
//! }
//! gateway.shutdown();
//! ```

// Public modules
pub mod alarm;
pub mod codec;
pub mod egress;
pub mod gateway;
pub mod ingress;
pub mod intents;
pub mod signals;
pub mod sink;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use alarm::{AlarmLatch, AlarmMessages, AlarmSnapshot, WarningLevel};
pub use codec::FrameCodec;
pub use gateway::{AlarmConfig, Gateway, GatewayConfig, TransmitConfig};
pub use intents::IntentStore;
pub use signals::database::{DatabaseStats, SignalDatabase};
pub use sink::{SinkEvent, SinkPublisher};
pub use transport::{BusTransport, TransportError};
pub use types::{DecodedSignal, Frame, GatewayError, Result, SignalValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
