//! Keithley 2400 series SourceMeter over a GPIB bridge.
//!
//! `READ?` returns five comma separated fields: voltage, current, resistance,
//! timestamp and a status word. Single-quantity measurements select a
//! non-concurrent measure function first and pick their field from the reply.

use super::{clip_message, FrontPanelText, PowerSupply};
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{parse_float, parse_float_list, Args, DriverProfile, Scpi, KEITHLEY_NAN};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    Arc::new(
        DriverProfile::new("Keithley 2400")
            .prefix(":")
            .nan(KEITHLEY_NAN)
            .wait(Duration::from_millis(250))
            .query_delay(Duration::from_millis(800))
            .timeout(Duration::from_secs(2))
            .gpib(24, 800, Duration::from_millis(1500))
            .resource("K2400_VISA", "TCPIP0::192.168.1.20::23::SOCKET"),
    )
});

/// What the SourceMeter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFunction {
    /// Source voltage, measure current.
    Voltage,
    /// Source current, measure voltage.
    Current,
}

impl SourceFunction {
    fn mnemonic(self) -> &'static str {
        match self {
            SourceFunction::Voltage => "VOLT",
            SourceFunction::Current => "CURR",
        }
    }
}

/// One `READ?` result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcrReading {
    /// Voltage in volts.
    pub voltage: f64,
    /// Current in amperes.
    pub current: f64,
    /// Resistance in ohms.
    pub resistance: f64,
    /// Instrument timestamp in seconds.
    pub timestamp: f64,
    /// Status word.
    pub status: u32,
}

impl VcrReading {
    fn bit(&self, bit: u32) -> bool {
        self.status & (1 << bit) != 0
    }

    /// Measured while over range.
    pub fn overrange(&self) -> bool {
        self.bit(0)
    }

    /// Measured with the filter enabled.
    pub fn filtered(&self) -> bool {
        self.bit(1)
    }

    /// Front terminals selected.
    pub fn front_terminals(&self) -> bool {
        self.bit(2)
    }

    /// In real compliance.
    pub fn in_compliance(&self) -> bool {
        self.bit(3)
    }

    /// Over-voltage protection limit reached.
    pub fn ovp_reached(&self) -> bool {
        self.bit(4)
    }

    /// In range compliance.
    pub fn range_compliance(&self) -> bool {
        self.bit(16)
    }
}

/// Keithley 2400 SourceMeter.
#[derive(Debug)]
pub struct Keithley2400 {
    scpi: Scpi,
}

impl Keithley2400 {
    /// SourceMeter at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// SourceMeter addressed by `K2400_VISA`.
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

    /// Select voltage or current sourcing. Exactly one of the flags must be set.
    ///
    /// # Errors
    ///
    /// [`DcpsError::InvalidArgument`] if both or neither are set; nothing is sent.
    pub fn set_source_function(
        &mut self,
        voltage: bool,
        current: bool,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        let function = match (voltage, current) {
            (true, false) => SourceFunction::Voltage,
            (false, true) => SourceFunction::Current,
            _ => {
                return Err(DcpsError::invalid_argument(
                    "set_source_function",
                    "one and only one mode can be selected",
                ))
            }
        };
        self.source(function, channel, wait)
    }

    /// Select the source function.
    pub fn source(&mut self, function: SourceFunction, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        self.scpi
            .send("SOUR{ch}:FUNC:MODE {function}", &Args::new().with("function", function.mnemonic()))?;
        self.scpi.settle(wait)
    }

    /// Select which quantities `READ?` measures. At least one must be set, and only
    /// one unless `concurrent`.
    ///
    /// # Errors
    ///
    /// [`DcpsError::InvalidArgument`] for an invalid combination; nothing is sent.
    pub fn set_measure_function(
        &mut self,
        concurrent: bool,
        voltage: bool,
        current: bool,
        resistance: bool,
        channel: Option<u8>,
    ) -> DcpsResult<()> {
        let selected = [voltage, current, resistance].iter().filter(|on| **on).count();
        if selected == 0 {
            return Err(DcpsError::invalid_argument(
                "set_measure_function",
                "at least one of voltage, current or resistance must be selected",
            ));
        }
        if !concurrent && selected > 1 {
            return Err(DcpsError::invalid_argument(
                "set_measure_function",
                "only one function can be selected unless concurrent",
            ));
        }
        self.scpi.use_channel(channel)?;

        let conc = if concurrent { "ON" } else { "OFF" };
        self.scpi.send(&format!("SENS{{ch}}:FUNC:CONC {}", conc), &Args::new())?;
        for (on, name) in [(voltage, "VOLT"), (current, "CURR"), (resistance, "RES")] {
            // Functions are only switched off explicitly in concurrent mode.
            if on {
                self.scpi.send(&format!("SENS{{ch}}:FUNC:ON \"{}\"", name), &Args::new())?;
            } else if concurrent {
                self.scpi.send(&format!("SENS{{ch}}:FUNC:OFF \"{}\"", name), &Args::new())?;
            }
        }
        Ok(())
    }

    /// One `READ?` with whatever measure functions are active.
    pub fn measure_vcr(&mut self, channel: Option<u8>) -> DcpsResult<VcrReading> {
        self.scpi.use_channel(channel)?;
        let reply = self.scpi.query("READ?", &Args::new(), None)?;
        let fields = parse_float_list("READ?", &reply)?;
        let [voltage, current, resistance, timestamp, status] = fields[..] else {
            return Err(DcpsError::parse("READ?", reply, "expected five fields"));
        };
        Ok(VcrReading {
            voltage,
            current,
            resistance,
            timestamp,
            status: status as u32,
        })
    }

    fn read_field(&mut self, index: usize) -> DcpsResult<f64> {
        let reply = self.scpi.query("READ?", &Args::new(), None)?;
        let field = reply
            .split(',')
            .nth(index)
            .ok_or_else(|| DcpsError::parse("READ?", &reply, "missing field"))?;
        parse_float("READ?", field)
    }
}

impl PowerSupply for Keithley2400 {
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
        self.set_measure_function(false, true, false, false, channel)?;
        self.read_field(0).map(Some)
    }

    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.set_measure_function(false, false, true, false, channel)?;
        self.read_field(1).map(Some)
    }

    fn measure_resistance(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.set_measure_function(false, false, false, true, channel)?;
        self.read_field(2).map(Some)
    }

    // Protection trips clear themselves and cannot be switched off.
    fn voltage_protection_on(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }

    fn voltage_protection_off(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }

    fn voltage_protection_clear(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }
}

impl FrontPanelText for Keithley2400 {
    fn display_message_on(&mut self, top: bool) -> DcpsResult<()> {
        let window = if top { 1 } else { 2 };
        self.scpi.send_literal(&format!("DISP:WIND{}:TEXT:STAT ON", window))
    }

    fn display_message_off(&mut self, top: bool) -> DcpsResult<()> {
        let window = if top { 1 } else { 2 };
        self.scpi.send_literal(&format!("DISP:WIND{}:TEXT:STAT OFF", window))
    }

    fn set_display_message(&mut self, message: &str, top: bool) -> DcpsResult<()> {
        let (window, max) = if top { (1, 20) } else { (2, 32) };
        let message = clip_message(message, max);
        self.scpi
            .send_literal(&format!("DISP:WIND{}:TEXT \"{}\"", window, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;

    fn attached(mock: &MockTransport) -> Keithley2400 {
        let mut smu = Keithley2400::new("TCPIP0::10.0.0.24::5025::SOCKET");
        smu.attach(Box::new(mock.clone())).unwrap();
        smu
    }

    #[test]
    fn test_source_function_requires_exactly_one() {
        let mock = MockTransport::new();
        let mut smu = attached(&mock);
        assert!(smu.set_source_function(true, true, None, None).is_err());
        assert!(smu.set_source_function(false, false, None, None).is_err());
        assert!(mock.writes().is_empty());
        smu.set_source_function(false, true, None, Some(Duration::ZERO)).unwrap();
        assert_eq!(mock.writes(), vec![":SOUR1:FUNC:MODE CURR"]);
    }

    #[test]
    fn test_measure_function_validation() {
        let mock = MockTransport::new();
        let mut smu = attached(&mock);
        assert!(smu.set_measure_function(false, false, false, false, None).is_err());
        assert!(smu.set_measure_function(false, true, true, false, None).is_err());
        assert!(mock.writes().is_empty());

        smu.set_measure_function(true, true, false, true, None).unwrap();
        assert_eq!(
            mock.writes(),
            vec![
                ":SENS1:FUNC:CONC ON",
                ":SENS1:FUNC:ON \"VOLT\"",
                ":SENS1:FUNC:OFF \"CURR\"",
                ":SENS1:FUNC:ON \"RES\""
            ]
        );
    }

    #[test]
    fn test_measure_current_picks_second_field() {
        let mock = MockTransport::new();
        let mut smu = attached(&mock);
        mock.push_reply("+1.000E+00,+2.500E-03,+9.910E+37,+1.234E+02,+2.1504E+04");
        assert_eq!(smu.measure_current(None).unwrap(), Some(2.5e-3));
        assert_eq!(
            mock.writes(),
            vec![":SENS1:FUNC:CONC OFF", ":SENS1:FUNC:ON \"CURR\"", ":READ?"]
        );
    }

    #[test]
    fn test_measure_vcr_status_bits() {
        let mock = MockTransport::new();
        let mut smu = attached(&mock);
        mock.push_reply("+1.000E+00,+2.500E-03,+4.000E+02,+1.234E+02,+2.1512E+04");
        let reading = smu.measure_vcr(None).unwrap();
        assert_eq!(reading.status, 21512);
        assert!(reading.in_compliance());
        assert!(!reading.overrange());
        assert_eq!(reading.resistance, 400.0);

        mock.push_reply("1.0,2.0");
        assert!(smu.measure_vcr(None).is_err());
    }
}
