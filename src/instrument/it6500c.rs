//! ITECH IT6500C/D two-quadrant supply and electronic load.

use super::{unsupported, PowerSupply};
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{Args, Capability, CommandTable, DriverProfile, RangeSetting, Scpi};
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::from_entries(&[
        ("isInput", "LOAD:STATe?"),
        ("inputOn", "LOAD ON"),
        ("inputOff", "LOAD OFF"),
        ("isVoltageProtectionTripped", "PROTection:TRIGgered?"),
        ("voltageProtectionClear", "PROTection:CLEar"),
        ("setCurrentRise", "CURRent:RISE {value}"),
        ("setCurrentFall", "CURRent:FALL {value}"),
        ("queryCurrentRise", "CURRent:RISE?"),
        ("queryCurrentFall", "CURRent:FALL?"),
        ("setVoltageRise", "VOLTage:RISE {value}"),
        ("setVoltageFall", "VOLTage:FALL {value}"),
        ("queryVoltageRise", "VOLTage:RISE?"),
        ("queryVoltageFall", "VOLTage:FALL?"),
        ("setPowerRise", "POWer:RISE {value}"),
        ("setPowerFall", "POWer:FALL {value}"),
        ("queryPowerRise", "POWer:RISE?"),
        ("queryPowerFall", "POWer:FALL?"),
        ("setDcrCapacity", "DCR:BATTery:CAPACity {value}"),
        ("queryDcrCapacity", "DCR:BATTery:CAPACity?"),
        ("dcrOn", "DCR ON"),
        ("dcrOff", "DCR OFF"),
        ("isDcr", "DCR?"),
        ("dcrData", "DCR:DATA?"),
    ])
    // A single PROTection:CLEar covers every trip.
    .disabled(&["isCurrentProtectionTripped", "currentProtectionClear"]);

    Arc::new(
        DriverProfile::new("ITECH IT6500C")
            .terminations("\n", Some("\n"))
            .overrides(overrides)
            .without(&[
                Capability::SourceRange,
                Capability::SourceFunction,
                Capability::ExtremaMeasurement,
                Capability::MeasureRange,
                Capability::ResistanceMeasurement,
                Capability::Compliance,
            ])
            .resource("IT6500C_VISA", "USB0::INSTR"),
    )
});

/// Priority of the constant-voltage or constant-current regulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPriority {
    /// `LOW`
    Low,
    /// `HIGH`
    High,
}

impl fmt::Display for LoopPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopPriority::Low => "LOW",
            LoopPriority::High => "HIGH",
        })
    }
}

impl FromStr for LoopPriority {
    type Err = DcpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(LoopPriority::Low),
            "HIGH" => Ok(LoopPriority::High),
            other => Err(DcpsError::invalid_argument(
                "loop priority",
                format!("expected LOW or HIGH, got '{}'", other),
            )),
        }
    }
}

/// Quantity whose slew time is programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// Current slew.
    Current,
    /// Voltage slew.
    Voltage,
    /// Power slew.
    Power,
}

impl Ramp {
    fn keys(self) -> [&'static str; 4] {
        match self {
            Ramp::Current => ["setCurrentRise", "setCurrentFall", "queryCurrentRise", "queryCurrentFall"],
            Ramp::Voltage => ["setVoltageRise", "setVoltageFall", "queryVoltageRise", "queryVoltageFall"],
            Ramp::Power => ["setPowerRise", "setPowerFall", "queryPowerRise", "queryPowerFall"],
        }
    }
}

/// ITECH IT6500C power supply.
#[derive(Debug)]
pub struct It6500c {
    scpi: Scpi,
}

impl It6500c {
    /// Supply at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Supply addressed by `IT6500C_VISA`.
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

    fn set_keyed(&mut self, key: &str, value: f64, wait: Option<Duration>) -> DcpsResult<()> {
        if let Some(template) = self.scpi.resolve(key)? {
            self.scpi.send(template, &Args::value(value))?;
            self.scpi.settle(wait)?;
        }
        Ok(())
    }

    fn query_keyed(&mut self, key: &str) -> DcpsResult<f64> {
        match self.scpi.resolve(key)? {
            Some(template) => self.scpi.query_value(template, &Args::new()),
            None => Err(DcpsError::UnknownCommand(key.to_string())),
        }
    }

    /// Rise time in seconds.
    pub fn set_rise(&mut self, ramp: Ramp, seconds: f64, wait: Option<Duration>) -> DcpsResult<()> {
        self.set_keyed(ramp.keys()[0], seconds, wait)
    }

    /// Fall time in seconds.
    pub fn set_fall(&mut self, ramp: Ramp, seconds: f64, wait: Option<Duration>) -> DcpsResult<()> {
        self.set_keyed(ramp.keys()[1], seconds, wait)
    }

    /// Rise time in seconds.
    pub fn query_rise(&mut self, ramp: Ramp) -> DcpsResult<f64> {
        self.query_keyed(ramp.keys()[2])
    }

    /// Fall time in seconds.
    pub fn query_fall(&mut self, ramp: Ramp) -> DcpsResult<f64> {
        self.query_keyed(ramp.keys()[3])
    }

    /// Internal resistance in ohms, for battery simulation.
    pub fn set_internal_resistance(&mut self, ohms: f64, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.send("RES {value}", &Args::value(ohms))?;
        self.scpi.settle(wait)
    }

    /// Internal resistance in ohms.
    pub fn query_internal_resistance(&mut self) -> DcpsResult<f64> {
        self.scpi.query_value("RES?", &Args::new())
    }

    /// Constant-voltage loop priority.
    pub fn set_cv_priority(&mut self, priority: LoopPriority, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi
            .send("CV:PRIority {priority}", &Args::new().with("priority", priority))?;
        self.scpi.settle(wait)
    }

    /// Constant-current loop priority. High suits LEDs and laser diodes.
    pub fn set_cc_priority(&mut self, priority: LoopPriority, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi
            .send("CC:PRIority {priority}", &Args::new().with("priority", priority))?;
        self.scpi.settle(wait)
    }

    /// Constant-voltage loop priority.
    pub fn query_cv_priority(&mut self) -> DcpsResult<LoopPriority> {
        self.query_priority("CV:PRIority?")
    }

    /// Constant-current loop priority.
    pub fn query_cc_priority(&mut self) -> DcpsResult<LoopPriority> {
        self.query_priority("CC:PRIority?")
    }

    fn query_priority(&mut self, command: &str) -> DcpsResult<LoopPriority> {
        let reply = self.scpi.query(command, &Args::new(), None)?;
        reply
            .parse()
            .map_err(|_| DcpsError::parse(command, reply, "expected LOW or HIGH"))
    }

    /// Battery capacity in amp hours for DC resistance measurement.
    pub fn set_dcr_capacity(&mut self, amp_hours: f64, wait: Option<Duration>) -> DcpsResult<()> {
        self.set_keyed("setDcrCapacity", amp_hours, wait)
    }

    /// Battery capacity in amp hours.
    pub fn query_dcr_capacity(&mut self) -> DcpsResult<f64> {
        self.query_keyed("queryDcrCapacity")
    }

    /// Enable or disable DC resistance measurement.
    pub fn set_dcr(&mut self, on: bool, wait: Option<Duration>) -> DcpsResult<()> {
        let key = if on { "dcrOn" } else { "dcrOff" };
        if let Some(template) = self.scpi.resolve(key)? {
            self.scpi.send(template, &Args::new())?;
            self.scpi.settle(wait)?;
        }
        Ok(())
    }

    /// True if DC resistance measurement is enabled.
    pub fn is_dcr_on(&mut self) -> DcpsResult<bool> {
        self.scpi.query_bool("DCR?", &Args::new())
    }

    /// DC resistance of the battery under charge, in ohms.
    pub fn measure_dcr(&mut self) -> DcpsResult<f64> {
        self.query_keyed("dcrData")
    }
}

impl It6500c {
    fn skip(&mut self, channel: Option<u8>, operation: &str) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        unsupported(self.model(), operation);
        Ok(())
    }
}

impl PowerSupply for It6500c {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    fn set_function(&mut self, _function: &str, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.skip(channel, "source functions")
    }

    fn query_function(&mut self, channel: Option<u8>) -> DcpsResult<Option<String>> {
        self.skip(channel, "source functions")?;
        Ok(None)
    }

    fn set_voltage_range(&mut self, _upper: Option<f64>, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.skip(channel, "source ranges")
    }

    fn set_current_range(&mut self, _upper: Option<f64>, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.skip(channel, "source ranges")
    }

    fn query_voltage_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.skip(channel, "source ranges")?;
        Ok(None)
    }

    fn query_current_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.skip(channel, "source ranges")?;
        Ok(None)
    }

    fn measure_voltage_max(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.skip(channel, "extrema measurements")?;
        Ok(None)
    }

    fn measure_voltage_min(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.skip(channel, "extrema measurements")?;
        Ok(None)
    }

    fn measure_current_max(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.skip(channel, "extrema measurements")?;
        Ok(None)
    }

    fn measure_current_min(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.skip(channel, "extrema measurements")?;
        Ok(None)
    }

    fn current_protection_clear(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.skip(channel, "a separate current protection latch")
    }

    fn is_current_protection_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.skip(channel, "a separate current protection latch")?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;
    use tracing_test::traced_test;

    fn attached(mock: &MockTransport) -> It6500c {
        let mut psu = It6500c::new("TCPIP0::10.0.0.30::30000::SOCKET");
        psu.attach(Box::new(mock.clone())).unwrap();
        psu
    }

    #[test]
    fn test_rise_and_fall_use_their_own_commands() {
        let mock = MockTransport::new().with_reply("0.25");
        let mut psu = attached(&mock);
        psu.set_rise(Ramp::Voltage, 0.1, Some(Duration::ZERO)).unwrap();
        psu.set_fall(Ramp::Voltage, 0.2, Some(Duration::ZERO)).unwrap();
        assert_eq!(psu.query_fall(Ramp::Power).unwrap(), 0.25);
        assert_eq!(
            mock.writes(),
            vec!["VOLTage:RISE 0.1", "VOLTage:FALL 0.2", "POWer:FALL?"]
        );
    }

    #[test]
    fn test_load_input_and_protection_overrides() {
        let mock = MockTransport::new().with_replies(["1", "0"]);
        let mut psu = attached(&mock);
        assert_eq!(psu.is_input_on(None).unwrap(), Some(true));
        psu.input_off(None, Some(Duration::ZERO)).unwrap();
        assert_eq!(psu.is_voltage_protection_tripped(None).unwrap(), Some(false));
        psu.current_protection_clear(None, None).unwrap();
        assert_eq!(
            mock.writes(),
            vec!["LOAD:STATe?", "LOAD OFF", "PROTection:TRIGgered?"]
        );
    }

    #[test]
    fn test_priority_round_trip() {
        let mock = MockTransport::new().with_replies(["HIGH", "medium"]);
        let mut psu = attached(&mock);
        psu.set_cc_priority(LoopPriority::High, Some(Duration::ZERO)).unwrap();
        assert_eq!(psu.query_cc_priority().unwrap(), LoopPriority::High);
        assert!(matches!(psu.query_cv_priority().unwrap_err(), DcpsError::Parse { .. }));
        assert_eq!(mock.writes()[0], "CC:PRIority HIGH");
        assert!("low".parse::<LoopPriority>().is_ok());
        assert!("mid".parse::<LoopPriority>().is_err());
    }

    #[test]
    #[traced_test]
    fn test_unsupported_ranges_are_silent() {
        let mock = MockTransport::new();
        let mut psu = attached(&mock);
        psu.set_voltage_range(Some(10.0), None, None).unwrap();
        assert_eq!(psu.query_current_range(None).unwrap(), None);
        assert_eq!(psu.measure_voltage_max(None).unwrap(), None);
        psu.set_function("VOLT", None, None).unwrap();
        assert_eq!(psu.is_current_protection_tripped(None).unwrap(), None);
        assert!(mock.events().is_empty());
        assert!(logs_contain("does not support source ranges"));
        assert!(logs_contain("does not support extrema measurements"));
        assert!(logs_contain("does not support source functions"));
        assert!(logs_contain("does not support a separate current protection latch"));
        assert!(psu.set_current_range(None, Some(2), None).is_err());
    }

    #[test]
    fn test_dcr() {
        let mock = MockTransport::new().with_replies(["ON", "0.0421"]);
        let mut psu = attached(&mock);
        psu.set_dcr_capacity(2.2, Some(Duration::ZERO)).unwrap();
        psu.set_dcr(true, Some(Duration::ZERO)).unwrap();
        assert!(psu.is_dcr_on().unwrap());
        assert_eq!(psu.measure_dcr().unwrap(), 0.0421);
        assert_eq!(
            mock.writes(),
            vec!["DCR:BATTery:CAPACity 2.2", "DCR ON", "DCR?", "DCR:DATA?"]
        );
    }
}
