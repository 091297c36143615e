//! DBC file parser
//!
//! Parses Vector DBC files and converts them into the internal signal
//! database format, including value tables (`VAL_`) so enumerated
//! signals can resolve to their names.

use std::collections::HashMap;
use std::path::Path;

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{GatewayError, Result};

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path)
        .map_err(|e| GatewayError::DbcParse(format!("Failed to read file {:?}: {}", path, e)))?;

    // Try UTF-8 first, then fallback to Latin-1/Windows-1252 encoding
    let dbc_content = match String::from_utf8(bytes.clone()) {
        Ok(content) => content,
        Err(_) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    // Parse using can-dbc crate
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        GatewayError::DbcParse(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    // Collect value tables up front: (frame id, signal name) -> table
    let value_tables = collect_value_tables(&dbc);

    let mut messages = Vec::new();
    for dbc_msg in dbc.messages() {
        messages.push(convert_message(dbc_msg, &value_tables));
    }

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

type ValueTables = HashMap<(u32, String), HashMap<i64, String>>;

/// Extract `VAL_` entries for signals
fn collect_value_tables(dbc: &can_dbc::DBC) -> ValueTables {
    let mut tables: ValueTables = HashMap::new();
    for desc in dbc.value_descriptions() {
        if let can_dbc::ValueDescription::Signal {
            message_id,
            signal_name,
            value_descriptions,
        } = desc
        {
            let table = tables
                .entry((message_id.0, signal_name.clone()))
                .or_default();
            for vd in value_descriptions {
                table.insert(*vd.a() as i64, vd.b().clone());
            }
        }
    }
    tables
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, value_tables: &ValueTables) -> MessageDefinition {
    let frame_id = dbc_msg.message_id().0;
    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| convert_signal(frame_id, dbc_sig, value_tables))
        .collect();

    MessageDefinition {
        id: frame_id,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
    }
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    frame_id: u32,
    dbc_sig: &can_dbc::Signal,
    value_tables: &ValueTables,
) -> SignalDefinition {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let value_table = value_tables
        .get(&(frame_id, dbc_sig.name().clone()))
        .cloned();

    SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        value_table,
    }
}
