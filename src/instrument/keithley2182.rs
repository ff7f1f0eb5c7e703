//! Keithley 2182/2182A nanovoltmeter over a GPIB bridge.

use super::{clip_message, FrontPanelText, PowerSupply};
use crate::error::DcpsResult;
use crate::scpi::{on_off, Args, Capability, CommandTable, DriverProfile, RangeSetting, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Overflow value reported by the 2182.
pub const NAN_2182: f64 = 9.9e37;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::from_entries(&[
        ("chanSelect", "SENS:CHAN {ch}"),
        ("setMeasureVoltageRangeAuto", "SENS:VOLT:CHAN{ch}:RANG:AUTO {state}"),
        ("setMeasureVoltageRange", "SENS:VOLT:CHAN{ch}:RANG {value}"),
        ("queryMeasureVoltageRangeAuto", "SENS:VOLT:CHAN{ch}:RANG:AUTO?"),
        ("queryMeasureVoltageRange", "SENS:VOLT:CHAN{ch}:RANG?"),
    ])
    .disabled(&[
        "setMeasureCurrentRangeAuto",
        "setMeasureCurrentRange",
        "queryMeasureCurrentRangeAuto",
        "queryMeasureCurrentRange",
    ]);

    Arc::new(
        DriverProfile::new("Keithley 2182")
            .channels(2)
            .prefix(":")
            .overrides(overrides)
            .nan(NAN_2182)
            .wait(Duration::from_millis(250))
            .query_delay(Duration::from_millis(800))
            .timeout(Duration::from_secs(2))
            .gpib(7, 1200, Duration::from_millis(1500))
            .without(&[
                Capability::Output,
                Capability::Input,
                Capability::VoltageSetpoint,
                Capability::CurrentSetpoint,
                Capability::SetpointReadback,
                Capability::CurrentMeasurement,
                Capability::PowerMeasurement,
                Capability::ResistanceMeasurement,
                Capability::ExtremaMeasurement,
                Capability::VoltageProtection,
                Capability::CurrentProtection,
                Capability::Compliance,
                Capability::SourceRange,
                Capability::SourceFunction,
            ])
            .resource("K2182_VISA", "TCPIP0::192.168.1.20::23::SOCKET"),
    )
});

/// Keithley 2182 two-channel nanovoltmeter. Measures voltage only.
#[derive(Debug)]
pub struct Keithley2182 {
    scpi: Scpi,
}

impl Keithley2182 {
    /// Meter at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Meter addressed by `K2182_VISA`.
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

    /// Line cycle synchronization: less noise, slower readings.
    pub fn set_line_sync(&mut self, on: bool, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi
            .send("SYSTem:LSYNc {state}", &Args::new().with("state", on_off(on)))?;
        self.scpi.settle(wait)
    }

    /// Line cycle synchronization state.
    pub fn query_line_sync(&mut self) -> DcpsResult<bool> {
        self.scpi.query_bool("SYSTem:LSYNc?", &Args::new())
    }

    /// Internal temperature in degrees Celsius.
    pub fn query_internal_temperature(&mut self) -> DcpsResult<f64> {
        self.scpi.query_value("SENS:TEMP:RTEM?", &Args::new())
    }
}

impl PowerSupply for Keithley2182 {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    fn set_local(&mut self) -> DcpsResult<()> {
        self.scpi.bridge_front_panel(true)
    }

    fn set_remote(&mut self) -> DcpsResult<()> {
        self.scpi.bridge_front_panel(false)
    }

    fn set_remote_lock(&mut self) -> DcpsResult<()> {
        Ok(())
    }

    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        self.scpi.send_literal("SENS:FUNC 'VOLT'")?;
        // The channel is selected for every reading, explicit or not.
        self.scpi.force_select_channel()?;
        self.scpi.query_value("READ?", &Args::new()).map(Some)
    }

    /// The meter cannot report a protection trip; answers `Some(true)` so callers
    /// notice.
    fn is_voltage_protection_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi.use_channel(channel)?;
        Ok(Some(true))
    }

    fn set_voltage_range(&mut self, upper: Option<f64>, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.set_measure_voltage_range(upper, channel, wait)
    }

    fn query_voltage_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.query_measure_voltage_range(channel)
    }
}

impl FrontPanelText for Keithley2182 {
    // Single message window; `top` is ignored.
    fn display_message_on(&mut self, _top: bool) -> DcpsResult<()> {
        self.scpi.send_literal("DISP:WIND1:TEXT:STAT ON")
    }

    fn display_message_off(&mut self, _top: bool) -> DcpsResult<()> {
        self.scpi.send_literal("DISP:WIND1:TEXT:STAT OFF")
    }

    fn set_display_message(&mut self, message: &str, _top: bool) -> DcpsResult<()> {
        let message = clip_message(message, 12);
        self.scpi
            .send_literal(&format!("DISP:WIND1:TEXT:DATA \"{}\"", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;

    fn attached(mock: &MockTransport) -> Keithley2182 {
        let mut meter = Keithley2182::new("TCPIP0::10.0.0.7::5025::SOCKET");
        meter.attach(Box::new(mock.clone())).unwrap();
        meter
    }

    #[test]
    fn test_measure_voltage_always_selects_channel() {
        let mock = MockTransport::new().with_replies(["1.2345E-06", "-3.0E-07"]);
        let mut meter = attached(&mock);
        assert_eq!(meter.measure_voltage(Some(2)).unwrap(), Some(1.2345e-6));
        assert_eq!(meter.measure_voltage(None).unwrap(), Some(-3.0e-7));
        assert_eq!(
            mock.writes(),
            vec![
                ":SENS:FUNC 'VOLT'",
                ":SENS:CHAN 2",
                ":READ?",
                ":SENS:FUNC 'VOLT'",
                ":SENS:CHAN 2",
                ":READ?"
            ]
        );
    }

    #[test]
    fn test_source_operations_are_silent() {
        let mock = MockTransport::new();
        let mut meter = attached(&mock);
        meter.set_voltage(1.0, Some(2), None).unwrap();
        meter.output_on(Some(1), None).unwrap();
        assert_eq!(meter.measure_current(None).unwrap(), None);
        assert_eq!(meter.query_voltage_protection(None).unwrap(), None);
        assert_eq!(meter.is_voltage_protection_tripped(None).unwrap(), Some(true));
        assert!(mock.events().is_empty());
        assert_eq!(meter.channel(), 1);
        assert_eq!(meter.profile().legacy_value(None), NAN_2182);
    }

    #[test]
    fn test_channel_voltage_range() {
        let mock = MockTransport::new();
        let mut meter = attached(&mock);
        meter.set_voltage_range(Some(0.1), None, Some(Duration::ZERO)).unwrap();
        meter.set_voltage_range(None, None, Some(Duration::ZERO)).unwrap();
        assert_eq!(
            mock.writes(),
            vec![
                ":SENS:VOLT:CHAN1:RANG:AUTO OFF",
                ":SENS:VOLT:CHAN1:RANG 0.1",
                ":SENS:VOLT:CHAN1:RANG:AUTO ON"
            ]
        );
    }

    #[test]
    fn test_line_sync_and_temperature() {
        let mock = MockTransport::new().with_replies(["1", "+2.5E+01"]);
        let mut meter = attached(&mock);
        meter.set_line_sync(true, Some(Duration::ZERO)).unwrap();
        assert!(meter.query_line_sync().unwrap());
        assert_eq!(meter.query_internal_temperature().unwrap(), 25.0);
        assert_eq!(mock.writes()[0], ":SYSTem:LSYNc ON");
    }
}
