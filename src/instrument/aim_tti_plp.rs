//! Aim TTi PL-P series power supplies.
//!
//! These supplies follow SCPI syntax loosely but use their own verbs with the
//! channel embedded in the command (`V1 5.0`, `OP2 1`). Replies to setpoint queries
//! echo the verb (`V1 5.000`) and measurement replies carry a unit (`4.998V`); both
//! are validated before the number is accepted.
//!
//! Only enough VXI-11 is implemented for discovery, so a `TCPIP::<host>::INSTR`
//! address is rewritten to the raw socket on port 9221.

use super::PowerSupply;
use crate::adapters::resource::rewrite_to_socket;
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{Args, Capability, CommandTable, DriverProfile, Scpi};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

/// Raw socket port of the PL-P LAN interface.
pub const SOCKET_PORT: u16 = 9221;

#[allow(clippy::unwrap_used)]
static SETPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s0-9]+)([0-9]+)\s+([0-9.eE+-]+)").unwrap());

#[allow(clippy::unwrap_used)]
static READING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9.+-]+)(\S+)").unwrap());

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::from_entries(&[
        ("isOutput", "OP{ch}?"),
        ("outputOn", "OP{ch} 1"),
        ("outputOff", "OP{ch} 0"),
        ("outputOnAll", "OPALL 1"),
        ("outputOffAll", "OPALL 0"),
        ("setVoltage", "V{ch} {value}"),
        ("setCurrent", "I{ch} {value}"),
        ("queryVoltage", "V{ch}?"),
        ("queryCurrent", "I{ch}?"),
        ("measureVoltage", "V{ch}O?"),
        ("measureCurrent", "I{ch}O?"),
        ("setLocal", "LOCAL"),
        // Any command switches the supply to remote.
        ("setRemote", "*WAI"),
        ("setRemoteLock", "IFLOCK"),
    ])
    .disabled(&["chanSelect", "beeperOn", "beeperOff"]);

    Arc::new(
        DriverProfile::new("Aim TTi PL-P")
            .channels(3)
            .terminations("\r\n", Some("\n"))
            .overrides(overrides)
            .without(&[
                Capability::Input,
                Capability::PowerMeasurement,
                Capability::ResistanceMeasurement,
                Capability::ExtremaMeasurement,
                Capability::VoltageProtection,
                Capability::CurrentProtection,
                Capability::Compliance,
                Capability::SourceRange,
                Capability::MeasureRange,
                Capability::SourceFunction,
                Capability::Beeper,
            ])
            .resource("TTIPLP_IP", "TCPIP0::192.168.1.100::9221::SOCKET"),
    )
});

/// Aim TTi PL-P triple output supply.
#[derive(Debug)]
pub struct AimTtiPlp {
    scpi: Scpi,
}

impl AimTtiPlp {
    /// Supply at `resource`, rewriting discovery addresses with a warning.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::with_options(resource, true, true)
    }

    /// Supply at `resource`. `rewrite` turns a discovery address into the raw socket
    /// address; `warn_on_rewrite` controls the warning about it.
    pub fn with_options(resource: impl Into<String>, rewrite: bool, warn_on_rewrite: bool) -> Self {
        let resource = Self::resolve_resource(resource.into(), rewrite, warn_on_rewrite);
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Supply addressed by `TTIPLP_IP`.
    pub fn from_env() -> Self {
        Self::new(Self::profile().resource_from_env())
    }

    /// Shared profile.
    pub fn profile() -> Arc<DriverProfile> {
        Arc::clone(&PROFILE)
    }

    /// Wrap a configured session.
    pub fn from_session(scpi: Scpi) -> Self {
        Self { scpi }
    }

    /// Apply the discovery-address rewrite to `resource`.
    pub fn resolve_resource(resource: String, rewrite: bool, warn_on_rewrite: bool) -> String {
        let Some(socket) = rewrite_to_socket(&resource, SOCKET_PORT) else {
            return resource;
        };
        if rewrite {
            if warn_on_rewrite {
                warn!(
                    "Auto re-wrote resource string from {} to {}. See manual on VXI-11 implementation",
                    resource, socket
                );
            }
            socket
        } else {
            if warn_on_rewrite {
                warn!("These Aim TTi PSUs only implement auto-discovery in VXI-11. Please refer to the manual of the PSU");
            }
            resource
        }
    }

    /// `V1 5.000` -> 5.0, checking the verb and the channel.
    fn parse_setpoint(&self, verb: &str, reply: &str) -> DcpsResult<f64> {
        let command = format!("{}{}?", verb, self.scpi.channel());
        let caps = SETPOINT_RE
            .captures(reply)
            .ok_or_else(|| DcpsError::parse(&command, reply, "expected <verb><channel> <value>"))?;
        let channel_matches = caps[2].parse::<u8>().ok() == Some(self.scpi.channel());
        if &caps[1] != verb || !channel_matches {
            return Err(DcpsError::parse(&command, reply, "reply is for another setting"));
        }
        caps[3]
            .parse::<f64>()
            .map_err(|_| DcpsError::parse(&command, reply, "expected a number"))
    }

    /// `4.998V` -> 4.998, checking the unit.
    fn parse_reading(&self, unit: &str, reply: &str) -> DcpsResult<f64> {
        let command = format!("{}{}O?", if unit == "V" { "V" } else { "I" }, self.scpi.channel());
        let caps = READING_RE
            .captures(reply)
            .ok_or_else(|| DcpsError::parse(&command, reply, "expected <value><unit>"))?;
        if &caps[2] != unit {
            return Err(DcpsError::parse(&command, reply, "unexpected unit"));
        }
        caps[1]
            .parse::<f64>()
            .map_err(|_| DcpsError::parse(&command, reply, "expected a number"))
    }

    fn fetch_with<F>(&mut self, cap: Capability, key: &str, channel: Option<u8>, parse: F) -> DcpsResult<Option<f64>>
    where
        F: Fn(&Self, &str) -> DcpsResult<f64>,
    {
        let reply = self.scpi.fetch_string(cap, key, &Args::new(), channel)?;
        reply.map(|reply| parse(self, &reply)).transpose()
    }
}

impl PowerSupply for AimTtiPlp {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    fn query_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.fetch_with(Capability::SetpointReadback, "queryVoltage", channel, |psu, reply| {
            psu.parse_setpoint("V", reply)
        })
    }

    fn query_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.fetch_with(Capability::SetpointReadback, "queryCurrent", channel, |psu, reply| {
            psu.parse_setpoint("I", reply)
        })
    }

    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.fetch_with(Capability::VoltageMeasurement, "measureVoltage", channel, |psu, reply| {
            psu.parse_reading("V", reply)
        })
    }

    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.fetch_with(Capability::CurrentMeasurement, "measureCurrent", channel, |psu, reply| {
            psu.parse_reading("A", reply)
        })
    }

    fn measure_all(&mut self, channel: Option<u8>) -> DcpsResult<Option<Vec<f64>>> {
        let voltage = self.measure_voltage(channel)?;
        let current = self.measure_current(None)?;
        Ok(voltage.zip(current).map(|(v, i)| vec![v, i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn attached() -> (AimTtiPlp, MockTransport) {
        let mock = MockTransport::new();
        let mut psu = AimTtiPlp::new("TCPIP0::192.168.1.100::9221::SOCKET");
        psu.attach(Box::new(mock.clone())).unwrap();
        (psu, mock)
    }

    #[test]
    fn test_channel_embedded_verbs_without_select() {
        let (mut psu, mock) = attached();
        psu.set_voltage(12.5, Some(2), Some(Duration::ZERO)).unwrap();
        psu.output_on(None, Some(Duration::ZERO)).unwrap();
        psu.output_off_all(Some(Duration::ZERO)).unwrap();
        assert_eq!(mock.writes(), vec!["V2 12.5", "OP2 1", "OPALL 0"]);
    }

    #[test]
    fn test_setpoint_reply_validation() {
        let (mut psu, mock) = attached();
        mock.push_reply("V1 5.000");
        assert_eq!(psu.query_voltage(Some(1)).unwrap(), Some(5.0));
        mock.push_reply("I1 0.500");
        assert!(matches!(
            psu.query_voltage(Some(1)).unwrap_err(),
            DcpsError::Parse { .. }
        ));
        mock.push_reply("V3 5.000");
        assert!(psu.query_voltage(Some(2)).is_err());
    }

    #[test]
    fn test_reading_unit_validation() {
        let (mut psu, mock) = attached();
        mock.push_reply("4.998V");
        assert_eq!(psu.measure_voltage(None).unwrap(), Some(4.998));
        mock.push_reply("0.250V");
        assert!(psu.measure_current(None).is_err());
    }

    #[test]
    fn test_unsupported_operations_are_silent() {
        let (mut psu, mock) = attached();
        psu.beeper_on().unwrap();
        psu.set_voltage_protection(30.0, None, None, None).unwrap();
        assert_eq!(psu.query_voltage_range(None).unwrap(), None);
        assert!(mock.events().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_discovery_address_rewritten_with_warning() {
        let psu = AimTtiPlp::new("TCPIP0::10.1.2.3::inst0::INSTR");
        assert_eq!(psu.scpi().resource(), "TCPIP::10.1.2.3::9221::SOCKET");
        assert!(logs_contain("Auto re-wrote resource string"));
    }

    #[test]
    #[traced_test]
    fn test_rewrite_disabled_keeps_address() {
        let psu = AimTtiPlp::with_options("TCPIP0::10.1.2.3::inst0::INSTR", false, true);
        assert_eq!(psu.scpi().resource(), "TCPIP0::10.1.2.3::inst0::INSTR");
        assert!(logs_contain("only implement auto-discovery"));
    }
}
