//! Keysight/Agilent E364xA bench supplies behind a KISS-488 GPIB bridge.

use super::PowerSupply;
use crate::adapters::Bridge;
use crate::error::DcpsResult;
use crate::scpi::{CommandTable, DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::from_entries(&[
        ("isOutput", "OUTPut?"),
        ("outputOn", "OUTPut ON"),
        ("outputOff", "OUTPut OFF"),
        ("setVoltage", "VOLTage {value}"),
        ("setCurrent", "CURRent {value}"),
        ("queryVoltage", "VOLTage?"),
        ("queryCurrent", "CURRent?"),
        ("measureVoltage", "MEASure:VOLTage?"),
        ("measureCurrent", "MEASure:CURRent?"),
        ("setVoltageProtection", "VOLTage:PROTection:LEVel {value}"),
        ("queryVoltageProtection", "VOLTage:PROTection:LEVel?"),
        ("voltageProtectionOn", "VOLTage:PROTection:STATe ON"),
        ("voltageProtectionOff", "VOLTage:PROTection:STATe OFF"),
    ])
    .disabled(&["beeperOn", "beeperOff", "setLocal", "setRemote", "setRemoteLock"]);

    Arc::new(
        DriverProfile::new("Keysight E364xA")
            .overrides(overrides)
            .wait(Duration::from_millis(100))
            .timeout(Duration::from_secs(3))
            .query_delay(Duration::from_secs(2))
            .bridge(Bridge::Kiss488)
            .gpib(5, 600, Duration::from_millis(500))
            .resource("E364XA_VISA", "TCPIP0::192.168.1.20::23::SOCKET"),
    )
});

/// Keysight E364xA. Always reached through a KISS-488 bridge: queries end in `\r` and
/// the bridge banner is drained on open, followed by `*CLS`.
#[derive(Debug)]
pub struct KeysightE364xA {
    scpi: Scpi,
}

impl KeysightE364xA {
    /// Supply at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Supply addressed by `E364XA_VISA`.
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
}

impl PowerSupply for KeysightE364xA {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    fn on_open(&mut self) -> DcpsResult<()> {
        self.scpi.cls(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockTransport, WireEvent};

    #[test]
    fn test_open_drains_banner_then_clears() {
        let mock = MockTransport::new().with_replies(["KISS-488 Ethernet GPIB", "\u{ff}\u{fe}"]);
        let mut psu = KeysightE364xA::new("TCPIP0::10.0.0.5::5025::SOCKET");
        psu.attach(Box::new(mock.clone())).unwrap();
        let events = mock.events();
        assert_eq!(events[0], WireEvent::Settle(Duration::from_millis(500)));
        assert_eq!(mock.writes(), vec!["*CLS"]);
        assert_eq!(mock.pending_replies(), 0);
    }

    #[test]
    fn test_queries_are_framed_for_kiss488() {
        let mock = MockTransport::new();
        let mut psu = KeysightE364xA::new("TCPIP0::10.0.0.5::23::SOCKET");
        psu.attach(Box::new(mock.clone())).unwrap();
        mock.clear_events();
        mock.push_reply("4.990");
        assert_eq!(psu.measure_voltage(None).unwrap(), Some(4.99));
        assert_eq!(
            mock.events(),
            vec![
                WireEvent::Write("MEASure:VOLTage?\r".into()),
                WireEvent::Settle(Duration::from_secs(2)),
                WireEvent::Read("4.990".into()),
            ]
        );
    }

    #[test]
    fn test_front_panel_commands_are_noops() {
        let mock = MockTransport::new();
        let mut psu = KeysightE364xA::new("TCPIP0::10.0.0.5::23::SOCKET");
        psu.attach(Box::new(mock.clone())).unwrap();
        mock.clear_events();
        psu.beeper_off().unwrap();
        psu.set_remote_lock().unwrap();
        psu.set_local().unwrap();
        assert!(mock.events().is_empty());
    }
}
