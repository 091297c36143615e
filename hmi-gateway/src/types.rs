//! Core types for the HMI gateway library
//!
//! This module defines the fundamental types moved across the gateway's
//! boundaries: raw bus frames, decoded signal values, and the error
//! taxonomy. The gateway itself keeps all state in memory; nothing here
//! is persisted.

use std::fmt;

use crate::transport::TransportError;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// A single frame on the vehicle bus
///
/// Identifier plus up to 8 bytes of payload. Extended identifiers are
/// carried as-is in `id`; the transport adapter is responsible for the
/// wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame identifier (11-bit or 29-bit)
    pub id: u32,
    /// Payload bytes (0-8)
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// Number of payload bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors that can occur in the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParse(String),

    #[error("Message not found: frame ID 0x{0:X}")]
    MessageNotFound(u32),

    #[error("Signal '{signal}' not found in frame ID 0x{frame_id:X}")]
    SignalNotInFrame { signal: String, frame_id: u32 },

    #[error("Value {value} for signal '{signal}' is out of range [{min}, {max}]")]
    OutOfRange {
        signal: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Payload too short for frame ID 0x{frame_id:X}: signal '{signal}' needs {needed} bytes, got {got}")]
    PayloadTooShort {
        frame_id: u32,
        signal: String,
        needed: usize,
        got: usize,
    },

    #[error("No value table entry '{name}' for signal '{signal}'")]
    UnknownEnumValue { signal: String, name: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded signal value
///
/// Constructed once at decode time and matched exhaustively by
/// consumers; no ad hoc type dispatch at call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Named value from a DBC value table
    Enumerated(String),
    /// Single-bit value without scaling
    Boolean(bool),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Enumerated(name) => write!(f, "{}", name),
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
        }
    }
}

impl SignalValue {
    /// Convert to f64 for range checks and encoding
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            SignalValue::Enumerated(_) => None,
        }
    }

    /// Convert to i64 if the value is numeric
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SignalValue::Integer(v) => Some(*v),
            SignalValue::Float(v) => Some(*v as i64),
            SignalValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            SignalValue::Enumerated(_) => None,
        }
    }
}

/// A signal extracted from a frame, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the DBC
    pub name: String,
    /// Decoded value
    pub value: SignalValue,
    /// Engineering unit (e.g., "km/h", "s", "m")
    pub unit: Option<String>,
    /// Raw value before scaling
    pub raw_value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_value_conversions() {
        let int_val = SignalValue::Integer(42);
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert_eq!(int_val.as_i64(), Some(42));

        let float_val = SignalValue::Float(3.14);
        assert_eq!(float_val.as_f64(), Some(3.14));
        assert_eq!(float_val.as_i64(), Some(3));

        let bool_val = SignalValue::Boolean(true);
        assert_eq!(bool_val.as_f64(), Some(1.0));
        assert_eq!(bool_val.as_i64(), Some(1));

        let enum_val = SignalValue::Enumerated("Drive".to_string());
        assert_eq!(enum_val.as_f64(), None);
        assert_eq!(enum_val.as_i64(), None);
    }

    #[test]
    fn test_signal_value_display() {
        assert_eq!(format!("{}", SignalValue::Integer(42)), "42");
        assert_eq!(format!("{}", SignalValue::Float(3.14159)), "3.142");
        assert_eq!(format!("{}", SignalValue::Enumerated("Park".into())), "Park");
        assert_eq!(format!("{}", SignalValue::Boolean(false)), "false");
    }

    #[test]
    fn test_frame_dlc() {
        let frame = Frame::new(0x519, vec![0x01, 0x00, 0x00]);
        assert_eq!(frame.dlc(), 3);
        assert_eq!(frame.id, 0x519);
    }
}
