//! Keithley/Tektronix DMM6500 digital multimeter.
//!
//! Most settings on this meter are per measurement function. Methods taking
//! `function: Option<MeasureFunction>` apply to that function, or to the function
//! currently active on the meter when `None`.

use super::{clip_message, FrontPanelText, PowerSupply};
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{on_off, Args, Capability, DriverProfile, RangeSetting, Scpi};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    Arc::new(
        DriverProfile::new("Keithley DMM6500")
            .prefix(":")
            .wait(Duration::from_millis(10))
            .query_delay(Duration::from_millis(10))
            .without(&[
                Capability::Output,
                Capability::Input,
                Capability::VoltageSetpoint,
                Capability::CurrentSetpoint,
                Capability::SetpointReadback,
                Capability::PowerMeasurement,
                Capability::ExtremaMeasurement,
                Capability::VoltageProtection,
                Capability::CurrentProtection,
                Capability::Compliance,
                Capability::SourceRange,
                Capability::SourceFunction,
                Capability::Beeper,
                Capability::RemoteMode,
            ])
            .resource("DMM6500_VISA", "TCPIP0::172.16.2.13::INSTR"),
    )
});

/// Measurement function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureFunction {
    /// DC voltage.
    VoltageDc,
    /// AC voltage.
    VoltageAc,
    /// DC current.
    CurrentDc,
    /// AC current.
    CurrentAc,
    /// Two-wire resistance.
    Resistance2W,
    /// Four-wire resistance.
    Resistance4W,
    /// Diode test.
    Diode,
    /// Capacitance.
    Capacitance,
    /// Temperature.
    Temperature,
    /// Continuity.
    Continuity,
    /// Frequency.
    Frequency,
    /// Period.
    Period,
    /// DC voltage ratio.
    VoltageRatio,
}

impl MeasureFunction {
    /// Every function.
    pub const ALL: [MeasureFunction; 13] = [
        MeasureFunction::VoltageDc,
        MeasureFunction::VoltageAc,
        MeasureFunction::CurrentDc,
        MeasureFunction::CurrentAc,
        MeasureFunction::Resistance2W,
        MeasureFunction::Resistance4W,
        MeasureFunction::Diode,
        MeasureFunction::Capacitance,
        MeasureFunction::Temperature,
        MeasureFunction::Continuity,
        MeasureFunction::Frequency,
        MeasureFunction::Period,
        MeasureFunction::VoltageRatio,
    ];

    /// SCPI mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            MeasureFunction::VoltageDc => "VOLT:DC",
            MeasureFunction::VoltageAc => "VOLT:AC",
            MeasureFunction::CurrentDc => "CURR:DC",
            MeasureFunction::CurrentAc => "CURR:AC",
            MeasureFunction::Resistance2W => "RES",
            MeasureFunction::Resistance4W => "FRES",
            MeasureFunction::Diode => "DIOD",
            MeasureFunction::Capacitance => "CAP",
            MeasureFunction::Temperature => "TEMP",
            MeasureFunction::Continuity => "CONT",
            MeasureFunction::Frequency => "FREQ:VOLT",
            MeasureFunction::Period => "PER:VOLT",
            MeasureFunction::VoltageRatio => "VOLT:DC:RAT",
        }
    }

    /// Parse a `FUNC?` reply (quotes allowed).
    pub fn from_mnemonic(reply: &str) -> Option<Self> {
        let reply = reply.trim().trim_matches('"');
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.mnemonic().eq_ignore_ascii_case(reply))
    }

    fn supports_auto_zero(self) -> bool {
        matches!(
            self,
            MeasureFunction::VoltageDc
                | MeasureFunction::CurrentDc
                | MeasureFunction::Resistance2W
                | MeasureFunction::Resistance4W
                | MeasureFunction::Diode
                | MeasureFunction::Temperature
                | MeasureFunction::VoltageRatio
        )
    }

    fn supports_range(self) -> bool {
        matches!(
            self,
            MeasureFunction::VoltageDc
                | MeasureFunction::VoltageAc
                | MeasureFunction::CurrentDc
                | MeasureFunction::CurrentAc
                | MeasureFunction::Resistance2W
                | MeasureFunction::Resistance4W
                | MeasureFunction::Capacitance
                | MeasureFunction::VoltageRatio
        )
    }
}

impl fmt::Display for MeasureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A numeric setting or one of the instrument's named levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    /// Explicit value.
    Value(f64),
    /// `DEF`
    Default,
    /// `MIN`
    Minimum,
    /// `MAX`
    Maximum,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Value(v) => f.write_str(&crate::scpi::number(*v)),
            Level::Default => f.write_str("DEF"),
            Level::Minimum => f.write_str("MIN"),
            Level::Maximum => f.write_str("MAX"),
        }
    }
}

/// Keithley DMM6500 multimeter.
#[derive(Debug)]
pub struct Keithley6500 {
    scpi: Scpi,
}

impl Keithley6500 {
    /// Meter at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Meter addressed by `DMM6500_VISA`.
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

    /// Make `function` the active measurement.
    pub fn set_measure_function(&mut self, function: MeasureFunction, channel: Option<u8>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        self.scpi.send(
            "SENS{ch}:FUNC:ON \"{function}\"",
            &Args::new().with("function", function),
        )
    }

    /// Active measurement function.
    pub fn query_measure_function(&mut self, channel: Option<u8>) -> DcpsResult<MeasureFunction> {
        self.scpi.use_channel(channel)?;
        let reply = self.scpi.query("SENS{ch}:FUNC?", &Args::new(), None)?;
        MeasureFunction::from_mnemonic(&reply)
            .ok_or_else(|| DcpsError::parse("SENS:FUNC?", reply, "unknown measurement function"))
    }

    /// Resolve an optional function, checking it against `allowed`.
    fn function_for(
        &mut self,
        function: Option<MeasureFunction>,
        operation: &'static str,
        allowed: fn(MeasureFunction) -> bool,
        channel: Option<u8>,
    ) -> DcpsResult<MeasureFunction> {
        let function = match function {
            Some(function) => function,
            None => self.query_measure_function(channel)?,
        };
        if !allowed(function) {
            return Err(DcpsError::invalid_argument(
                operation,
                format!("not available for function {}", function),
            ));
        }
        Ok(function)
    }

    /// Automatic zeroing for `function`.
    pub fn set_auto_zero(
        &mut self,
        on: bool,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "set_auto_zero", MeasureFunction::supports_auto_zero, None)?;
        let args = Args::new().with("function", function).with("state", on_off(on));
        self.scpi.send("SENS{ch}:{function}:AZERo:STATe {state}", &args)?;
        self.scpi.settle(wait)
    }

    /// Zero once now and wait for completion.
    pub fn auto_zero_once(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        self.scpi.send("SENS{ch}:AZERo:ONCE", &Args::new())?;
        self.scpi.settle(wait)?;
        self.scpi.wait_complete()
    }

    /// Relative offset for `function`; `None` makes the meter acquire it from the
    /// present reading.
    pub fn set_relative_offset(
        &mut self,
        offset: Option<Level>,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "set_relative_offset", |_| true, None)?;
        let args = Args::new().with("function", function);
        match offset {
            None => self.scpi.send("SENS{ch}:{function}:REL:ACQuire", &args)?,
            Some(level) => self
                .scpi
                .send("SENS{ch}:{function}:REL {level}", &args.with("level", level))?,
        }
        self.scpi.settle(wait)
    }

    /// Relative offset of `function`.
    pub fn query_relative_offset(&mut self, function: Option<MeasureFunction>, channel: Option<u8>) -> DcpsResult<f64> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "query_relative_offset", |_| true, None)?;
        self.scpi
            .query_value("SENS{ch}:{function}:REL?", &Args::new().with("function", function))
    }

    /// Enable or disable the relative offset of `function`.
    pub fn set_relative_offset_state(
        &mut self,
        on: bool,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "set_relative_offset_state", |_| true, None)?;
        let args = Args::new().with("function", function).with("state", on_off(on));
        self.scpi.send("SENS{ch}:{function}:REL:STATe {state}", &args)?;
        self.scpi.settle(wait)
    }

    /// Integration time in power line cycles.
    pub fn set_integration_time(
        &mut self,
        nplc: Level,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "set_integration_time", |_| true, None)?;
        let args = Args::new().with("function", function).with("nplc", nplc);
        self.scpi.send("SENS{ch}:{function}:NPLC {nplc}", &args)?;
        self.scpi.settle(wait)
    }

    /// Integration time in power line cycles.
    pub fn query_integration_time(&mut self, function: Option<MeasureFunction>, channel: Option<u8>) -> DcpsResult<f64> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "query_integration_time", |_| true, None)?;
        self.scpi
            .query_value("SENS{ch}:{function}:NPLC?", &Args::new().with("function", function))
    }

    /// Measurement range of `function`; `None` selects automatic ranging.
    pub fn set_measure_range(
        &mut self,
        upper: Option<f64>,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "set_measure_range", MeasureFunction::supports_range, None)?;
        let auto = format!("SENSe{{ch}}:{}:RANGe:AUTO {{state}}", function);
        let range = format!("SENSe{{ch}}:{}:RANGe {{value}}", function);
        self.scpi
            .set_generic_range(upper, Some(&auto), Some(&range), None, wait)
    }

    /// Measurement range of `function`.
    pub fn query_measure_range(
        &mut self,
        function: Option<MeasureFunction>,
        channel: Option<u8>,
    ) -> DcpsResult<Option<RangeSetting>> {
        self.scpi.use_channel(channel)?;
        let function = self.function_for(function, "query_measure_range", MeasureFunction::supports_range, None)?;
        let auto = format!("SENSe{{ch}}:{}:RANGe:AUTO?", function);
        let range = format!("SENSe{{ch}}:{}:RANGe?", function);
        self.scpi.query_generic_range(Some(&auto), Some(&range), None)
    }

    /// Select `function` and take one reading. `delay` overrides the query delay.
    pub fn measure(
        &mut self,
        function: MeasureFunction,
        channel: Option<u8>,
        delay: Option<Duration>,
    ) -> DcpsResult<f64> {
        self.set_measure_function(function, channel)?;
        let reply = self.scpi.query("READ?", &Args::new(), delay)?;
        crate::scpi::parse_float("READ?", &reply)
    }
}

impl PowerSupply for Keithley6500 {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    /// Restore continuous triggering and leave remote mode.
    fn set_local(&mut self) -> DcpsResult<()> {
        self.scpi.send("TRIG:CONT REST", &Args::new())?;
        self.scpi.settle(Some(Duration::from_millis(10)))?;
        self.scpi.query("-LOGOUT", &Args::new(), None).map(drop)
    }

    fn is_output_on(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi.use_channel(channel)?;
        Ok(Some(false))
    }

    // Meter inputs are always live.
    fn is_input_on(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi.use_channel(channel)?;
        Ok(Some(true))
    }

    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.measure(MeasureFunction::VoltageDc, channel, None).map(Some)
    }

    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.measure(MeasureFunction::CurrentDc, channel, None).map(Some)
    }

    fn measure_resistance(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.measure(MeasureFunction::Resistance2W, channel, None).map(Some)
    }
}

impl FrontPanelText for Keithley6500 {
    // The user screen has both lines; `top` only matters for the text.
    fn display_message_on(&mut self, _top: bool) -> DcpsResult<()> {
        self.scpi.send_literal("DISPlay:SCReen SWIPE_USER")
    }

    fn display_message_off(&mut self, _top: bool) -> DcpsResult<()> {
        self.scpi.send_literal("DISPlay:CLE")?;
        self.scpi.send_literal("DISPlay:SCReen HOME")
    }

    fn set_display_message(&mut self, message: &str, top: bool) -> DcpsResult<()> {
        let (line, max) = if top { (1, 20) } else { (2, 32) };
        let message = clip_message(message, max);
        self.scpi
            .send_literal(&format!("DISP:USER{}:TEXT \"{}\"", line, message))
    }
}
