//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DcpsError`, shared by the transports,
//! the SCPI dispatcher and every vendor driver. Using the `thiserror` crate, it gives a
//! single place to describe what can go wrong while talking to a bench instrument.
//!
//! ## Error Hierarchy
//!
//! - **Configuration errors** (`InvalidChannel`, `UnknownCommand`, `InvalidArgument`,
//!   `Template`, `Config`, `Resource`): raised synchronously by the call that detects them.
//!   Nothing is sent to the instrument when one of these is returned.
//! - **Transport errors** (`Io`, `Timeout`, `NotConnected`, `FeatureNotEnabled` and the
//!   feature-gated backend wrappers): propagated unmodified from the connection. The crate
//!   never retries.
//! - **Protocol errors** (`Parse`): an instrument reply that does not match the expected
//!   numeric or structured pattern.
//!
//! Calling an operation an instrument does not support is *not* an error; see
//! [`crate::scpi::Capability`].

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type DcpsResult<T> = std::result::Result<T, DcpsError>;

/// Errors raised by transports, the dispatcher and the vendor drivers.
#[derive(Error, Debug)]
pub enum DcpsError {
    /// Channel outside `1..=max`.
    #[error("Invalid channel number: {channel}. Must be between 1 and {max}, inclusive.")]
    InvalidChannel {
        /// Requested channel.
        channel: u8,
        /// Channel count of the instrument.
        max: u8,
    },

    /// Operation key found in neither the override nor the base command table.
    #[error("Unknown command key '{0}'")]
    UnknownCommand(String),

    /// A driver method was called with an argument the instrument cannot accept.
    #[error("{operation}: {reason}")]
    InvalidArgument {
        /// Driver method that rejected the argument.
        operation: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// Template interpolation failed (missing or malformed slot).
    #[error("Failed to format command template '{template}': {reason}")]
    Template {
        /// The template as found in the command table.
        template: String,
        /// Formatter message.
        reason: String,
    },

    /// Configuration file or environment could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Resource string could not be understood.
    #[error("Unsupported resource string: {0}")]
    Resource(String),

    /// Reply did not have the expected shape.
    #[error("Unexpected reply to '{command}': '{response}' ({reason})")]
    Parse {
        /// Command that produced the reply.
        command: String,
        /// Reply as received (trimmed).
        response: String,
        /// What was expected.
        reason: String,
    },

    /// I/O error from the underlying connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Read did not complete within the configured timeout.
    #[error("Timed out waiting for instrument reply")]
    Timeout,

    /// Operation attempted before `open()` or after `close()`.
    #[error("Instrument not connected")]
    NotConnected,

    /// The transport needed for a resource was compiled out.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    /// Serial port backend error.
    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// VISA backend error.
    #[cfg(feature = "instrument_visa")]
    #[error("VISA error: {0}")]
    Visa(#[from] visa_rs::Error),
}

impl From<figment::Error> for DcpsError {
    fn from(err: figment::Error) -> Self {
        DcpsError::Config(Box::new(err))
    }
}

impl DcpsError {
    /// Build an [`DcpsError::InvalidArgument`].
    pub fn invalid_argument(operation: &'static str, reason: impl Into<String>) -> Self {
        DcpsError::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    /// Build a [`DcpsError::Parse`].
    pub fn parse(
        command: impl Into<String>,
        response: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DcpsError::Parse {
            command: command.into(),
            response: response.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by a read timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            DcpsError::Timeout => true,
            DcpsError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DcpsError::InvalidChannel { channel: 4, max: 3 };
        assert_eq!(
            err.to_string(),
            "Invalid channel number: 4. Must be between 1 and 3, inclusive."
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = DcpsError::parse("MEAS:VOLT?", "garbage", "expected a number");
        assert!(err.to_string().contains("MEAS:VOLT?"));
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn test_timeout_classification() {
        assert!(DcpsError::Timeout.is_timeout());
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(DcpsError::Io(io).is_timeout());
        assert!(!DcpsError::NotConnected.is_timeout());
    }
}
