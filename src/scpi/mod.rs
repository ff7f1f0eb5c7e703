//! SCPI command layer.
//!
//! Resolution of operation keys through vendor override tables, template
//! interpolation with the prefix rule, typed reply parsing, GPIB bridge framing and
//! the [`Scpi`] session that ties them to a [`crate::adapters::Transport`].

pub mod bridge;
pub mod capabilities;
pub mod dispatcher;
pub mod format;
pub mod parse;
pub mod profile;
pub mod table;

pub use capabilities::{Capabilities, Capability};
pub use dispatcher::{RangeSetting, Scpi};
pub use format::{apply_prefix, interpolate, number, on_off, Args};
pub use parse::{parse_bool, parse_bool_strict, parse_float, parse_float_list, InstrumentError};
pub use profile::{DriverProfile, KEITHLEY_NAN};
pub use table::{resolve, CommandTable, Template, SCPI_BASE};
