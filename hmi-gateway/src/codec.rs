//! Frame codec
//!
//! Extracts signal values from raw frames and packs signal values into
//! outbound frames, based on definitions from the signal database.
//! Handles bit extraction/insertion, endianness, sign extension, and
//! physical value conversion.
//!
//! Encoding validates declared ranges and refuses out-of-range values;
//! it never silently clamps.

use std::collections::HashMap;
use std::sync::Arc;

use crate::signals::database::{ByteOrder, SignalDefinition, ValueType};
use crate::types::{DecodedSignal, Frame, GatewayError, Result, SignalValue};

/// Classic frames carry at most 8 payload bytes
const MAX_FRAME_LEN: usize = 8;

/// Frame codec over a loaded signal database
pub struct FrameCodec {
    db: Arc<crate::signals::SignalDatabase>,
}

impl FrameCodec {
    pub fn new(db: Arc<crate::signals::SignalDatabase>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &crate::signals::SignalDatabase {
        &self.db
    }

    /// Decode a frame into its signal values
    ///
    /// Fails on an unknown frame identifier or a payload too short for
    /// one of the message's signals; the caller drops the frame.
    pub fn decode(&self, frame: &Frame) -> Result<Vec<DecodedSignal>> {
        let message = self
            .db
            .message(frame.id)
            .ok_or(GatewayError::MessageNotFound(frame.id))?;

        let mut decoded = Vec::with_capacity(message.signals.len());
        for signal in &message.signals {
            decoded.push(decode_signal(frame, signal)?);
        }
        Ok(decoded)
    }

    /// Encode signal values into one outbound frame
    ///
    /// Every named signal must belong to the frame and every value must
    /// be inside the signal's declared range. Signals of the frame not
    /// named in `values` encode as zero. The payload is the message
    /// size, padded to 8 bytes.
    pub fn encode(&self, frame_id: u32, values: &HashMap<String, SignalValue>) -> Result<Frame> {
        let message = self
            .db
            .message(frame_id)
            .ok_or(GatewayError::MessageNotFound(frame_id))?;

        for name in values.keys() {
            if !message.signals.iter().any(|s| &s.name == name) {
                return Err(GatewayError::SignalNotInFrame {
                    signal: name.clone(),
                    frame_id,
                });
            }
        }

        let mut data = vec![0u8; message.size.max(1).min(MAX_FRAME_LEN)];
        for signal in &message.signals {
            if let Some(value) = values.get(&signal.name) {
                let raw = raw_from_value(signal, value)?;
                insert_signal_value(&mut data, signal, raw);
            }
        }

        // Original HMI pads every outbound payload to a full frame
        if data.len() < MAX_FRAME_LEN {
            data.resize(MAX_FRAME_LEN, 0);
        }

        Ok(Frame::new(frame_id, data))
    }
}

/// Decode a single signal from frame data
fn decode_signal(frame: &Frame, signal: &SignalDefinition) -> Result<DecodedSignal> {
    let raw_value = extract_signal_value(frame, signal)?;

    // Apply physical value conversion (factor and offset)
    let physical_value = signal.offset + signal.factor * (raw_value as f64);

    let value = if let Some(name) = signal.value_name(raw_value) {
        SignalValue::Enumerated(name.to_string())
    } else if signal.factor == 1.0 && signal.offset == 0.0 && signal.length == 1 {
        // Single bit, no scaling
        SignalValue::Boolean(raw_value != 0)
    } else if signal.factor != 1.0 || signal.offset != 0.0 {
        // Scaled signal
        SignalValue::Float(physical_value)
    } else {
        // Integer signal (no scaling)
        SignalValue::Integer(raw_value)
    };

    Ok(DecodedSignal {
        name: signal.name.clone(),
        value,
        unit: signal.unit.clone(),
        raw_value,
    })
}

/// Convert a signal value back to its raw representation, checking range
fn raw_from_value(signal: &SignalDefinition, value: &SignalValue) -> Result<i64> {
    let physical = match value {
        SignalValue::Enumerated(name) => {
            let raw = signal
                .value_table
                .as_ref()
                .and_then(|table| table.iter().find(|(_, n)| n.as_str() == name))
                .map(|(raw, _)| *raw)
                .ok_or_else(|| GatewayError::UnknownEnumValue {
                    signal: signal.name.clone(),
                    name: name.clone(),
                })?;
            return Ok(raw);
        }
        SignalValue::Integer(v) => *v as f64,
        SignalValue::Float(v) => *v,
        SignalValue::Boolean(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
    };

    check_range(signal, physical)?;

    let raw = if signal.factor != 0.0 {
        ((physical - signal.offset) / signal.factor).round() as i64
    } else {
        0
    };
    Ok(raw)
}

/// Extract raw signal value from frame data
fn extract_signal_value(frame: &Frame, signal: &SignalDefinition) -> Result<i64> {
    let start_bit = signal.start_bit as usize;
    let length = signal.length as usize;

    let required_bytes = (start_bit + length + 7) / 8;
    if required_bytes > frame.data.len() {
        return Err(GatewayError::PayloadTooShort {
            frame_id: frame.id,
            signal: signal.name.clone(),
            needed: required_bytes,
            got: frame.data.len(),
        });
    }

    let raw_value = match signal.byte_order {
        ByteOrder::LittleEndian => extract_little_endian(&frame.data, start_bit, length),
        ByteOrder::BigEndian => extract_big_endian(&frame.data, start_bit, length),
    };

    let signed_value = match signal.value_type {
        ValueType::Unsigned => raw_value as i64,
        ValueType::Signed => sign_extend(raw_value, length),
    };

    Ok(signed_value)
}

/// Pack a raw value into frame data
fn insert_signal_value(data: &mut [u8], signal: &SignalDefinition, raw: i64) {
    let start_bit = signal.start_bit as usize;
    let length = signal.length as usize;

    // Two's complement representation truncated to the signal width
    let unsigned = if length >= 64 {
        raw as u64
    } else {
        (raw as u64) & ((1u64 << length) - 1)
    };

    match signal.byte_order {
        ByteOrder::LittleEndian => insert_little_endian(data, start_bit, length, unsigned),
        ByteOrder::BigEndian => insert_big_endian(data, start_bit, length, unsigned),
    }
}

/// Extract signal with little-endian (Intel) byte order
///
/// Start bit points to the LSB; bits are numbered from LSB to MSB
/// within each byte.
fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        if byte_idx < data.len() {
            let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << i;
        }
    }

    result
}

/// Extract signal with big-endian (Motorola) byte order
///
/// Start bit points to the MSB of the signal; bit 0 is the MSB of
/// byte 0 and the signal grows towards higher bit numbers.
fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = 7 - (bit_pos % 8);

        if byte_idx < data.len() {
            let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << (length - 1 - i);
        }
    }

    result
}

fn insert_little_endian(data: &mut [u8], start_bit: usize, length: usize, value: u64) {
    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        if byte_idx < data.len() {
            let bit_value = ((value >> i) & 0x01) as u8;
            data[byte_idx] &= !(1 << bit_in_byte);
            data[byte_idx] |= bit_value << bit_in_byte;
        }
    }
}

fn insert_big_endian(data: &mut [u8], start_bit: usize, length: usize, value: u64) {
    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = 7 - (bit_pos % 8);

        if byte_idx < data.len() {
            let bit_value = ((value >> (length - 1 - i)) & 0x01) as u8;
            data[byte_idx] &= !(1 << bit_in_byte);
            data[byte_idx] |= bit_value << bit_in_byte;
        }
    }
}

/// Sign-extend a value from N bits to 64 bits
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}

/// Used by the egress scheduler to reject out-of-range intents before
/// building the frame, per the boundary contract.
pub fn check_range(signal: &SignalDefinition, physical: f64) -> Result<()> {
    if signal.has_range() && (physical < signal.min || physical > signal.max) {
        return Err(GatewayError::OutOfRange {
            signal: signal.name.clone(),
            value: physical,
            min: signal.min,
            max: signal.max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::{MessageDefinition, SignalDatabase};

    fn signal(
        name: &str,
        start_bit: u16,
        length: u16,
        byte_order: ByteOrder,
        value_type: ValueType,
        factor: f64,
        offset: f64,
        min: f64,
        max: f64,
    ) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type,
            factor,
            offset,
            min,
            max,
            unit: None,
            value_table: None,
        }
    }

    fn test_codec() -> FrameCodec {
        let mut db = SignalDatabase::new();
        db.add_message(MessageDefinition {
            id: 0x519,
            name: "HMI_Request".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                signal(
                    "Dyno_mode_req_team",
                    0,
                    1,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    1.0,
                    0.0,
                    0.0,
                    1.0,
                ),
                signal(
                    "AIN_engaged",
                    1,
                    1,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    1.0,
                    0.0,
                    0.0,
                    1.0,
                ),
                signal(
                    "DMS_engage",
                    2,
                    1,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    1.0,
                    0.0,
                    0.0,
                    1.0,
                ),
            ],
        });
        db.add_message(MessageDefinition {
            id: 0x509,
            name: "PCM_Status".to_string(),
            size: 8,
            sender: None,
            signals: vec![
                signal(
                    "RESS_SOC",
                    0,
                    16,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    0.01,
                    0.0,
                    0.0,
                    100.0,
                ),
                signal(
                    "RESS_Temp",
                    16,
                    8,
                    ByteOrder::LittleEndian,
                    ValueType::Unsigned,
                    1.0,
                    -40.0,
                    -40.0,
                    215.0,
                ),
            ],
        });
        FrameCodec::new(Arc::new(db))
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_little_endian(&data, 0, 8), 0xAB);
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_little_endian(&data, 0, 16), 0xCDAB);
    }

    #[test]
    fn test_extract_big_endian_simple() {
        // Bit 0 is the MSB of byte 0, so a whole-byte read starts at 0
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_big_endian(&data, 0, 8), 0xAB);
        assert_eq!(extract_big_endian(&data, 0, 16), 0xABCD);
    }

    #[test]
    fn test_extract_big_endian_unaligned() {
        // Start bit 7 is the LSB of byte 0; the read continues into the
        // high bits of byte 1: 1 + 1100110 = 0xE6
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_big_endian(&data, 7, 8), 0xE6);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x8000, 16), -32768);
    }

    #[test]
    fn test_insert_then_extract_little_endian() {
        let mut data = vec![0u8; 8];
        insert_little_endian(&mut data, 3, 11, 0x5A5);
        assert_eq!(extract_little_endian(&data, 3, 11), 0x5A5);
    }

    #[test]
    fn test_insert_then_extract_big_endian() {
        let mut data = vec![0u8; 8];
        insert_big_endian(&mut data, 7, 12, 0xABC);
        assert_eq!(extract_big_endian(&data, 7, 12), 0xABC);
    }

    #[test]
    fn test_decode_scaled_signal() {
        let codec = test_codec();
        // RESS_SOC raw 5000 * 0.01 = 50.0 %, RESS_Temp raw 65 - 40 = 25 C
        let frame = Frame::new(0x509, vec![0x88, 0x13, 0x41, 0, 0, 0, 0, 0]);
        let decoded = codec.decode(&frame).unwrap();

        let soc = decoded.iter().find(|s| s.name == "RESS_SOC").unwrap();
        assert_eq!(soc.value, SignalValue::Float(50.0));
        assert_eq!(soc.raw_value, 5000);

        let temp = decoded.iter().find(|s| s.name == "RESS_Temp").unwrap();
        assert_eq!(temp.value, SignalValue::Float(25.0));
    }

    #[test]
    fn test_decode_unknown_frame() {
        let codec = test_codec();
        let frame = Frame::new(0x7FF, vec![0; 8]);
        assert!(matches!(
            codec.decode(&frame),
            Err(GatewayError::MessageNotFound(0x7FF))
        ));
    }

    #[test]
    fn test_decode_short_payload() {
        let codec = test_codec();
        let frame = Frame::new(0x509, vec![0x88]);
        assert!(matches!(
            codec.decode(&frame),
            Err(GatewayError::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn test_encode_combined_intents() {
        let codec = test_codec();
        let mut values = HashMap::new();
        values.insert("Dyno_mode_req_team".to_string(), SignalValue::Integer(1));
        values.insert("AIN_engaged".to_string(), SignalValue::Integer(0));
        values.insert("DMS_engage".to_string(), SignalValue::Integer(1));

        let frame = codec.encode(0x519, &values).unwrap();
        assert_eq!(frame.id, 0x519);
        assert_eq!(frame.data.len(), 8);
        assert_eq!(frame.data[0], 0b0000_0101);
    }

    #[test]
    fn test_encode_rejects_unknown_signal() {
        let codec = test_codec();
        let mut values = HashMap::new();
        values.insert("Not_A_Signal".to_string(), SignalValue::Integer(1));
        assert!(matches!(
            codec.encode(0x519, &values),
            Err(GatewayError::SignalNotInFrame { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        let codec = test_codec();
        let mut values = HashMap::new();
        values.insert("Dyno_mode_req_team".to_string(), SignalValue::Integer(2));
        assert!(matches!(
            codec.encode(0x519, &values),
            Err(GatewayError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_round_trip_intents() {
        let codec = test_codec();
        let mut values = HashMap::new();
        values.insert("Dyno_mode_req_team".to_string(), SignalValue::Integer(1));
        values.insert("AIN_engaged".to_string(), SignalValue::Integer(1));
        values.insert("DMS_engage".to_string(), SignalValue::Integer(0));

        let frame = codec.encode(0x519, &values).unwrap();
        let decoded = codec.decode(&frame).unwrap();

        for sig in decoded {
            let expected = values.get(&sig.name).unwrap().as_i64().unwrap();
            assert_eq!(sig.raw_value, expected, "signal {}", sig.name);
        }
    }
}
