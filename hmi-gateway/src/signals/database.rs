//! Unified signal database
//!
//! Holds message definitions loaded from a DBC file and answers the
//! lookups the codec and the gateway startup validation need.

use std::collections::HashMap;
use std::path::Path;

use crate::types::{GatewayError, Result};

/// A complete bus message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// Frame identifier
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender node name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
}

/// A signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the frame
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit
    pub unit: Option<String>,
    /// Value table for enum-like values (raw value -> name)
    pub value_table: Option<HashMap<i64, String>>,
}

impl SignalDefinition {
    /// True if the DBC declares a usable physical range.
    ///
    /// DBC files commonly carry `[0|0]` for "no range declared"; a
    /// degenerate range must not reject every nonzero value.
    pub fn has_range(&self) -> bool {
        self.min < self.max
    }

    /// Look up the name for a raw value in the value table
    pub fn value_name(&self, raw: i64) -> Option<&str> {
        self.value_table
            .as_ref()
            .and_then(|table| table.get(&raw))
            .map(String::as_str)
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// The loaded signal database
pub struct SignalDatabase {
    /// Message definitions by frame identifier
    messages: HashMap<u32, MessageDefinition>,

    /// Signal name lookup: signal name -> frame identifier
    signal_lookup: HashMap<String, u32>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            signal_lookup: HashMap::new(),
        }
    }

    /// Load a signal database from a DBC file
    ///
    /// Fails fatally at startup if the file is missing or unparseable.
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        let mut db = Self::new();
        for message in dbc_messages(path)? {
            db.add_message(message);
        }
        let stats = db.stats();
        log::info!(
            "Signal database loaded: {} messages, {} signals",
            stats.num_messages,
            stats.num_signals
        );
        Ok(db)
    }

    /// Add a message definition to the database
    pub fn add_message(&mut self, message: MessageDefinition) {
        for signal in &message.signals {
            self.signal_lookup.insert(signal.name.clone(), message.id);
        }
        self.messages.insert(message.id, message);
    }

    /// Get a message definition by frame identifier
    pub fn message(&self, frame_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&frame_id)
    }

    /// Get a signal definition within a specific frame
    pub fn signal(&self, frame_id: u32, signal_name: &str) -> Option<&SignalDefinition> {
        self.messages
            .get(&frame_id)
            .and_then(|msg| msg.signals.iter().find(|s| s.name == signal_name))
    }

    /// Find the frame carrying a signal name
    pub fn frame_for_signal(&self, signal_name: &str) -> Option<u32> {
        self.signal_lookup.get(signal_name).copied()
    }

    /// Validate that every name in `signal_names` is a signal of `frame_id`
    ///
    /// Used at startup for the outbound frame spec; fail-fast on a
    /// mismatch rather than discovering it on the first send.
    pub fn validate_frame_signals(&self, frame_id: u32, signal_names: &[String]) -> Result<()> {
        let message = self
            .messages
            .get(&frame_id)
            .ok_or(GatewayError::MessageNotFound(frame_id))?;
        for name in signal_names {
            if !message.signals.iter().any(|s| &s.name == name) {
                return Err(GatewayError::SignalNotInFrame {
                    signal: name.clone(),
                    frame_id,
                });
            }
        }
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|m| m.signals.len()).sum(),
        }
    }
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

fn dbc_messages(path: &Path) -> Result<Vec<MessageDefinition>> {
    crate::signals::dbc::parse_dbc_file(path)
}
