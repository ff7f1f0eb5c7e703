//! GPIB-over-Ethernet bridge framing and start-up handshakes.
//!
//! KISS-488 only needs a `\r` after a query to know a reply is expected, and prints
//! a banner after connecting. Prologix adapters are configured with their own `++`
//! meta-commands and must be told explicitly when to read from the instrument.

use crate::adapters::{Bridge, Transport};
use crate::error::DcpsResult;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on banner lines read before giving up on a chatty adapter.
const MAX_BANNER_LINES: usize = 32;

/// Add the bridge's query framing to an already prefixed query.
pub fn frame_query(bridge: Bridge, write_termination: &str, query: &str) -> String {
    match bridge {
        Bridge::None => query.to_string(),
        Bridge::Kiss488 => format!("{}\r", query),
        Bridge::Prologix => format!("{}{}++read eoi", query, write_termination),
    }
}

/// Prologix controller set-up for the instrument at `gpib_address`.
pub fn prologix_setup(gpib_address: u8, read_timeout_ms: u32) -> Vec<String> {
    vec![
        "++mode 1".to_string(),
        "++auto 0".to_string(),
        format!("++addr {}", gpib_address),
        "++eos 2".to_string(),
        "++eoi 1".to_string(),
        format!("++read_tmo_ms {}", read_timeout_ms),
        "++eot_enable 0".to_string(),
    ]
}

/// Read and discard whatever the adapter sends after connecting, until a read times
/// out. Lines carrying the KISS-488 banner are logged; others are dropped.
pub fn drain_banner(transport: &mut dyn Transport, settle: Duration) -> DcpsResult<Vec<String>> {
    transport.settle(settle);
    let mut banner = Vec::new();
    for _ in 0..MAX_BANNER_LINES {
        match transport.read_line() {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.contains("KISS-488") {
                    info!("{}", line);
                    banner.push(line);
                } else {
                    debug!("Discarding start-up output '{}'", line);
                }
            }
            Err(err) if err.is_timeout() => return Ok(banner),
            Err(err) => {
                warn!("Stopped reading adapter banner: {}", err);
                return Ok(banner);
            }
        }
    }
    Ok(banner)
}

/// Configure a Prologix adapter and log its version string.
pub fn configure_prologix(
    transport: &mut dyn Transport,
    gpib_address: u8,
    read_timeout_ms: u32,
    version_delay: Duration,
) -> DcpsResult<String> {
    for line in prologix_setup(gpib_address, read_timeout_ms) {
        debug!("WRITE: {}", line);
        transport.write_line(&line)?;
    }
    // Plain write then read: `++read` is not wanted for adapter meta-commands.
    transport.write_line("++ver")?;
    transport.settle(version_delay);
    let version = transport.read_line()?.trim().to_string();
    info!("{}", version);
    Ok(version)
}
