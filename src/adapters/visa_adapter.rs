//! VISA adapter for GPIB/USB/VXI-11 instruments
//!
//! Supports resource strings like:
//! - "GPIB0::1::INSTR" (GPIB interface)
//! - "USB0::0x1234::0x5678::SERIAL::INSTR" (USBTMC)
//! - "TCPIP0::192.168.1.100::INSTR" (VXI-11 / LXI)
//!
//! Requires a system VISA library and the `instrument_visa` feature.

use super::{Framing, Transport};
use crate::error::DcpsResult;

#[cfg(not(feature = "instrument_visa"))]
use crate::error::DcpsError;

#[cfg(feature = "instrument_visa")]
use super::stream::{StreamTransport, TimeoutControl};
#[cfg(feature = "instrument_visa")]
use std::ffi::CString;
#[cfg(feature = "instrument_visa")]
use std::io::{Read, Write};
#[cfg(feature = "instrument_visa")]
use std::time::Duration;
#[cfg(feature = "instrument_visa")]
use tracing::debug;
#[cfg(feature = "instrument_visa")]
use visa_rs::{flags::AccessMode, DefaultRM, Instrument, VisaString};

/// Owns the resource manager for as long as the session is open.
#[cfg(feature = "instrument_visa")]
pub struct VisaSession {
    instrument: Instrument,
    _rm: DefaultRM,
}

#[cfg(feature = "instrument_visa")]
impl std::io::Read for VisaSession {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.instrument.read(buf)
    }
}

#[cfg(feature = "instrument_visa")]
impl std::io::Write for VisaSession {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.instrument.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.instrument.flush()
    }
}

#[cfg(feature = "instrument_visa")]
impl TimeoutControl for VisaSession {
    fn apply_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        // The session keeps the timeout it was opened with.
        debug!("VISA read timeout stays at session default (requested {:?})", timeout);
        Ok(())
    }
}

#[cfg(feature = "instrument_visa")]
fn resource_name(resource: &str) -> DcpsResult<VisaString> {
    let c_string = CString::new(resource)
        .map_err(|e| crate::DcpsError::Resource(format!("{}: {}", resource, e)))?;
    Ok(VisaString::from(c_string))
}

/// Open a VISA session for `resource`.
#[cfg(feature = "instrument_visa")]
pub fn open(resource: &str, framing: Framing) -> DcpsResult<Box<dyn Transport>> {
    let name = resource_name(resource)?;
    let rm = DefaultRM::new()?;
    let instrument = rm.open(&name, AccessMode::NO_LOCK, framing.timeout)?;
    debug!("VISA session opened: {}", resource);
    Ok(Box::new(StreamTransport::new(
        VisaSession {
            instrument,
            _rm: rm,
        },
        framing,
        format!("visa {}", resource),
    )))
}

/// VISA support compiled out.
#[cfg(not(feature = "instrument_visa"))]
pub fn open(resource: &str, framing: Framing) -> DcpsResult<Box<dyn Transport>> {
    let _ = (resource, framing);
    Err(DcpsError::FeatureNotEnabled("instrument_visa".to_string()))
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "instrument_visa"))]
    #[test]
    fn test_open_without_feature_reports_flag() {
        use super::*;
        let err = open("USB0::INSTR", Framing::default()).err().unwrap();
        assert!(err.to_string().contains("instrument_visa"));
    }

    #[cfg(feature = "instrument_visa")]
    #[test]
    fn test_resource_name_conversion() {
        use super::*;
        assert!(resource_name("USB0::0x2EC7::0x6500::INSTR").is_ok());
        let err = resource_name("GPIB0::1\0::INSTR").err();
        assert!(matches!(err, Some(crate::DcpsError::Resource(_))));
    }
}
