//! Signal database
//!
//! The loaded description of the vehicle bus: frame identifiers mapped
//! to named signals with bit layouts, physical ranges, units, and
//! value tables. Loaded once at startup from a DBC file; a missing or
//! unparseable file is a startup precondition failure, not a runtime
//! error.

pub mod database;
pub mod dbc;

pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
};
