//! Resource string parsing.
//!
//! Instruments are addressed with VISA-style strings. Raw sockets and serial ports
//! are handled natively; everything else goes to the VISA library.

use super::serial_adapter;
use crate::error::{DcpsError, DcpsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// Literal patterns, checked by the tests below.

#[allow(clippy::unwrap_used)]
static SOCKET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^TCPIP(\d*)::([^:]+)::(\d+)::SOCKET$").unwrap()
});
#[allow(clippy::unwrap_used)]
static DISCOVERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^TCPIP\d*::([^:]+)(::.*)?$").unwrap()
});
#[allow(clippy::unwrap_used)]
static SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ASRL(.*)::INSTR$").unwrap());

/// TCP port of KISS-488 GPIB-over-Ethernet bridges.
pub const KISS488_PORT: u16 = 23;
/// TCP port of Prologix GPIB-over-Ethernet bridges.
pub const PROLOGIX_PORT: u16 = 1234;

/// GPIB-over-Ethernet adapter found in front of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridge {
    /// Direct connection.
    None,
    /// KISS-488: queries end with `\r`, banner printed on connect.
    Kiss488,
    /// Prologix GPIB-ETHERNET: `++` meta-commands, explicit `++read`.
    Prologix,
}

/// Parsed connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// `TCPIP[n]::host::port::SOCKET`
    Socket {
        /// Host name or IP.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// `ASRL<board>::INSTR`
    Serial {
        /// OS port name.
        port: String,
    },
    /// Handed to the VISA library verbatim.
    Visa(String),
}

impl ResourceAddress {
    /// Parse a resource string.
    ///
    /// # Errors
    ///
    /// Returns [`DcpsError::Resource`] for empty strings or unusable socket ports.
    pub fn parse(resource: &str) -> DcpsResult<Self> {
        let resource = resource.trim();
        if resource.is_empty() {
            return Err(DcpsError::Resource("empty resource string".to_string()));
        }
        if let Some(caps) = SOCKET_RE.captures(resource) {
            let port = caps[3]
                .parse::<u16>()
                .map_err(|_| DcpsError::Resource(format!("invalid port in '{}'", resource)))?;
            return Ok(ResourceAddress::Socket {
                host: caps[2].to_string(),
                port,
            });
        }
        if let Some(caps) = SERIAL_RE.captures(resource) {
            return Ok(ResourceAddress::Serial {
                port: serial_adapter::port_name(&caps[1])?,
            });
        }
        Ok(ResourceAddress::Visa(resource.to_string()))
    }

    /// GPIB bridge implied by the address (by well-known TCP port).
    pub fn bridge(&self) -> Bridge {
        match self {
            ResourceAddress::Socket { port, .. } if *port == KISS488_PORT => Bridge::Kiss488,
            ResourceAddress::Socket { port, .. } if *port == PROLOGIX_PORT => Bridge::Prologix,
            _ => Bridge::None,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::Socket { host, port } => write!(f, "TCPIP::{}::{}::SOCKET", host, port),
            ResourceAddress::Serial { port } => write!(f, "ASRL{}::INSTR", port),
            ResourceAddress::Visa(resource) => f.write_str(resource),
        }
    }
}

/// Rewrite a TCPIP discovery address (`TCPIP0::host::INSTR`, `TCPIP::host`) into a raw
/// socket address on `port`. Returns `None` for anything that is already a socket or
/// is not a TCPIP resource.
pub fn rewrite_to_socket(resource: &str, port: u16) -> Option<String> {
    let resource = resource.trim();
    if SOCKET_RE.is_match(resource) || resource.ends_with("SOCKET") {
        return None;
    }
    DISCOVERY_RE
        .captures(resource)
        .map(|caps| format!("TCPIP::{}::{}::SOCKET", &caps[1], port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket() {
        let addr = ResourceAddress::parse("TCPIP0::192.168.1.20::23::SOCKET").unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Socket {
                host: "192.168.1.20".into(),
                port: 23
            }
        );
        assert_eq!(addr.bridge(), Bridge::Kiss488);
    }

    #[test]
    fn test_bridge_detection() {
        let prologix = ResourceAddress::parse("TCPIP::10.0.0.5::1234::SOCKET").unwrap();
        assert_eq!(prologix.bridge(), Bridge::Prologix);
        let raw = ResourceAddress::parse("TCPIP0::10.0.0.5::5025::SOCKET").unwrap();
        assert_eq!(raw.bridge(), Bridge::None);
        let usb = ResourceAddress::parse("USB0::INSTR").unwrap();
        assert_eq!(usb, ResourceAddress::Visa("USB0::INSTR".into()));
        assert_eq!(usb.bridge(), Bridge::None);
    }

    #[test]
    fn test_parse_serial_path() {
        let addr = ResourceAddress::parse("ASRL/dev/ttyUSB0::INSTR").unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Serial {
                port: "/dev/ttyUSB0".into()
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_port() {
        assert!(ResourceAddress::parse("  ").is_err());
        assert!(ResourceAddress::parse("TCPIP0::host::99999::SOCKET").is_err());
    }

    #[test]
    fn test_rewrite_discovery_address() {
        assert_eq!(
            rewrite_to_socket("TCPIP0::192.168.1.100::INSTR", 9221).as_deref(),
            Some("TCPIP::192.168.1.100::9221::SOCKET")
        );
        assert_eq!(
            rewrite_to_socket("TCPIP::plp.local", 9221).as_deref(),
            Some("TCPIP::plp.local::9221::SOCKET")
        );
        assert_eq!(rewrite_to_socket("TCPIP0::1.2.3.4::9221::SOCKET", 9221), None);
        assert_eq!(rewrite_to_socket("USB0::INSTR", 9221), None);
    }
}
