//! Transport adapters
//!
//! This module contains implementations of the [`Transport`] trait, the low-level
//! line-oriented I/O abstraction the SCPI dispatcher talks through. Every adapter
//! appends the write terminator on send and strips the read terminator on receive,
//! so the dispatcher only ever handles bare command and reply strings.

pub mod mock;
pub mod resource;
pub mod serial_adapter;
pub mod socket_adapter;
pub mod stream;
pub mod visa_adapter;

pub use mock::{MockTransport, WireEvent};
pub use resource::{Bridge, ResourceAddress};
pub use socket_adapter::SocketAdapter;
pub use stream::StreamTransport;

use crate::error::DcpsResult;
use std::time::Duration;

/// Line framing applied by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    /// Appended to every written line.
    pub write_termination: String,
    /// Marks the end of a reply line. `None` reads until the first `\n`.
    pub read_termination: Option<String>,
    /// Read timeout.
    pub timeout: Duration,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            write_termination: "\n".to_string(),
            read_termination: Some("\n".to_string()),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Synchronous, exclusive connection to one instrument.
pub trait Transport: Send {
    /// Send one line; the write terminator is appended.
    fn write_line(&mut self, line: &str) -> DcpsResult<()>;

    /// Read one reply line with the read terminator removed.
    fn read_line(&mut self) -> DcpsResult<String>;

    /// Read exactly `count` raw bytes.
    fn read_bytes(&mut self, count: usize) -> DcpsResult<Vec<u8>>;

    /// Change the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> DcpsResult<()>;

    /// Block for a settling delay.
    fn settle(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    /// Discard unread input already buffered on the host side.
    fn clear_input(&mut self) -> DcpsResult<()> {
        Ok(())
    }

    /// Release the connection.
    fn close(&mut self) -> DcpsResult<()> {
        Ok(())
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Open a transport for `address` with the given framing.
///
/// # Errors
///
/// Returns [`crate::DcpsError::FeatureNotEnabled`] when the backend needed for the
/// resource was compiled out, or the backend's own error when opening fails.
pub fn connect(address: &ResourceAddress, framing: Framing) -> DcpsResult<Box<dyn Transport>> {
    match address {
        ResourceAddress::Socket { host, port, .. } => {
            Ok(Box::new(SocketAdapter::connect(host, *port, framing)?))
        }
        ResourceAddress::Serial { port } => serial_adapter::open(port, framing),
        ResourceAddress::Visa(resource) => visa_adapter::open(resource, framing),
    }
}
