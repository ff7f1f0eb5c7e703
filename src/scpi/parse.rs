//! Typed reply parsing.

use crate::error::{DcpsError, DcpsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

#[allow(clippy::unwrap_used)]
static ERROR_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([+-]?\d+)\s*,\s*"?([^"]*)"?\s*$"#).unwrap());

/// Parse a numeric reply.
///
/// # Errors
///
/// [`DcpsError::Parse`] if the reply is not a decimal number.
pub fn parse_float(command: &str, reply: &str) -> DcpsResult<f64> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|_| DcpsError::parse(command, reply.trim(), "expected a number"))
}

/// Parse a comma separated list of numbers (`MEASure:ALL?`, `READ?`).
pub fn parse_float_list(command: &str, reply: &str) -> DcpsResult<Vec<f64>> {
    reply
        .trim()
        .split(',')
        .map(|field| parse_float(command, field))
        .collect()
}

/// Permissive boolean: `ON`, `1` and `YES` are true, anything else is false.
pub fn parse_bool(reply: &str) -> bool {
    let token = first_token(reply);
    let on = ["ON", "1", "YES"].iter().any(|t| token.eq_ignore_ascii_case(t));
    if !on && !["OFF", "0", "NO"].iter().any(|t| token.eq_ignore_ascii_case(t)) {
        debug!("Unrecognized boolean reply '{}' read as false", reply.trim());
    }
    on
}

/// Strict boolean: only `ON/1/YES` and `OFF/0/NO` are accepted.
pub fn parse_bool_strict(command: &str, reply: &str) -> DcpsResult<bool> {
    let token = first_token(reply);
    if ["ON", "1", "YES"].iter().any(|t| token.eq_ignore_ascii_case(t)) {
        Ok(true)
    } else if ["OFF", "0", "NO"].iter().any(|t| token.eq_ignore_ascii_case(t)) {
        Ok(false)
    } else {
        Err(DcpsError::parse(command, reply.trim(), "expected ON/OFF, 1/0 or YES/NO"))
    }
}

fn first_token(reply: &str) -> &str {
    reply
        .trim()
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or("")
}

/// One entry of the instrument error queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentError {
    /// SCPI error number; 0 means the queue is empty.
    pub code: i32,
    /// Message text without quotes.
    pub message: String,
}

impl InstrumentError {
    /// Parse a `SYSTem:ERRor?` reply like `-113,"Undefined header"`.
    pub fn parse(reply: &str) -> DcpsResult<Self> {
        let caps = ERROR_ENTRY_RE
            .captures(reply)
            .ok_or_else(|| DcpsError::parse("SYSTem:ERRor?", reply.trim(), "expected <code>,\"<message>\""))?;
        let code = caps[1]
            .parse::<i32>()
            .map_err(|_| DcpsError::parse("SYSTem:ERRor?", reply.trim(), "error code out of range"))?;
        Ok(Self {
            code,
            message: caps[2].trim().to_string(),
        })
    }

    /// True for the "no error" entry.
    pub fn is_empty(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},\"{}\"", self.code, self.message)
    }
}
