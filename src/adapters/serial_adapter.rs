//! Serial adapter for RS-232 / USB-CDC instruments (`ASRL...::INSTR`).
//!
//! Wraps the `serialport` crate behind the `instrument_serial` feature. Without the
//! feature, opening a serial resource reports [`DcpsError::FeatureNotEnabled`].

use super::{Framing, Transport};
use crate::error::{DcpsError, DcpsResult};

#[cfg(feature = "instrument_serial")]
use super::stream::{StreamTransport, TimeoutControl};
#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::time::Duration;
#[cfg(feature = "instrument_serial")]
use tracing::debug;

/// Baud rate used by the supported serial instruments (Korad, BK).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[cfg(feature = "instrument_serial")]
impl TimeoutControl for Box<dyn SerialPort> {
    fn apply_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_timeout(timeout).map_err(std::io::Error::from)
    }
}

/// Open `port` (e.g. `/dev/ttyUSB0`, `COM3`) at [`DEFAULT_BAUD_RATE`].
#[cfg(feature = "instrument_serial")]
pub fn open(port: &str, framing: Framing) -> DcpsResult<Box<dyn Transport>> {
    let serial = serialport::new(port, DEFAULT_BAUD_RATE)
        .timeout(framing.timeout)
        .open()?;
    debug!("Serial port '{}' opened at {} baud", port, DEFAULT_BAUD_RATE);
    Ok(Box::new(StreamTransport::new(
        serial,
        framing,
        format!("serial {}", port),
    )))
}

/// Serial support compiled out.
#[cfg(not(feature = "instrument_serial"))]
pub fn open(port: &str, framing: Framing) -> DcpsResult<Box<dyn Transport>> {
    let _ = (port, framing);
    Err(DcpsError::FeatureNotEnabled("instrument_serial".to_string()))
}

/// Map the board part of an `ASRL<board>::INSTR` resource to an OS port name.
///
/// Numeric boards become `COM<n>` on Windows and `/dev/ttyS<n>` elsewhere; anything
/// else (`ASRL/dev/ttyUSB0::INSTR`) is taken as a literal device path.
pub fn port_name(board: &str) -> DcpsResult<String> {
    if board.is_empty() {
        return Err(DcpsError::Resource("ASRL resource without a port".to_string()));
    }
    if board.chars().all(|c| c.is_ascii_digit()) {
        if cfg!(windows) {
            Ok(format!("COM{}", board))
        } else {
            Ok(format!("/dev/ttyS{}", board))
        }
    } else {
        Ok(board.to_string())
    }
}
