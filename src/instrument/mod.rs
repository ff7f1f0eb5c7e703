//! Instrument drivers.
//!
//! Every driver implements [`PowerSupply`], whose default methods are the generic
//! SCPI behaviour expressed through [`Scpi`] keyed dispatch. A vendor driver supplies
//! a [`DriverProfile`] (override table, terminators, capabilities, defaults) and only
//! overrides the methods whose sequencing differs from plain SCPI.
//!
//! Channel-scoped methods take `channel: Option<u8>`: `Some(n)` makes `n` current
//! (sending a channel select on multi-channel models) and `None` keeps the current
//! channel. Setting methods take `wait: Option<Duration>`; `None` uses the driver's
//! default settling delay.
//!
//! Queries return `Ok(None)` when the model lacks the capability. Use
//! [`DriverProfile::legacy_value`] where a numeric sentinel is required.

pub mod aim_tti_plp;
pub mod bk9115;
pub mod generic;
pub mod it6500c;
pub mod keithley2182;
pub mod keithley2400;
pub mod keithley622x;
pub mod keithley6500;
pub mod keysight_e364xa;
pub mod korad_ka;
pub mod registry;
pub mod rigol_dl3000;

pub use aim_tti_plp::AimTtiPlp;
pub use bk9115::Bk9115;
pub use generic::GenericScpi;
pub use it6500c::{It6500c, LoopPriority, Ramp};
pub use keithley2182::Keithley2182;
pub use keithley2400::{Keithley2400, SourceFunction, VcrReading};
pub use keithley622x::Keithley622x;
pub use keithley6500::{Keithley6500, Level, MeasureFunction};
pub use keysight_e364xa::KeysightE364xA;
pub use korad_ka::{KoradKa, KoradStatus, RegulationMode, Tracking};
pub use registry::DriverKind;
pub use rigol_dl3000::RigolDl3000;

use crate::adapters::Transport;
use crate::error::DcpsResult;
use crate::scpi::{
    parse_float_list, Args, Capability, DriverProfile, InstrumentError, RangeSetting, Scpi,
};
use std::time::Duration;
use tracing::warn;

/// Programmable power supply, load, source or meter.
///
/// Implementors provide access to their [`Scpi`] session; everything else has a
/// default.
pub trait PowerSupply: Send {
    /// Session with the instrument.
    fn scpi(&self) -> &Scpi;

    /// Mutable session with the instrument.
    fn scpi_mut(&mut self) -> &mut Scpi;

    /// Extra start-up steps run after the connection is established.
    fn on_open(&mut self) -> DcpsResult<()> {
        Ok(())
    }

    /// Model name.
    fn model(&self) -> &'static str {
        self.scpi().profile().model
    }

    /// Static model description.
    fn profile(&self) -> &DriverProfile {
        self.scpi().profile()
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Connect to the configured resource.
    fn open(&mut self) -> DcpsResult<()> {
        self.scpi_mut().open()?;
        self.on_open()
    }

    /// Use an already opened transport.
    fn attach(&mut self, transport: Box<dyn Transport>) -> DcpsResult<()> {
        self.scpi_mut().attach(transport)?;
        self.on_open()
    }

    /// Release the connection.
    fn close(&mut self) -> DcpsResult<()> {
        self.scpi_mut().close()
    }

    /// Current channel.
    fn channel(&self) -> u8 {
        self.scpi().channel()
    }

    /// Select the current channel.
    fn set_channel(&mut self, channel: u8) -> DcpsResult<()> {
        self.scpi_mut().set_channel(channel)
    }

    /// Identification string.
    fn idn(&mut self) -> DcpsResult<String> {
        self.scpi_mut().idn()
    }

    /// Reset to power-on defaults.
    fn rst(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().rst(wait)
    }

    /// Clear status and the error queue.
    fn cls(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().cls(wait)
    }

    /// Block until pending operations complete.
    fn wait_complete(&mut self) -> DcpsResult<()> {
        self.scpi_mut().wait_complete()
    }

    /// Drain the instrument error queue.
    fn read_errors(&mut self) -> DcpsResult<Vec<InstrumentError>> {
        self.scpi_mut().read_errors()
    }

    /// Drain the error queue into the log. Returns the number of entries.
    fn log_all_errors(&mut self) -> DcpsResult<usize> {
        self.scpi_mut().log_all_errors()
    }

    // ------------------------------------------------------------------
    // Front panel
    // ------------------------------------------------------------------

    /// Return the front panel to local control.
    fn set_local(&mut self) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::RemoteMode, "setLocal", &Args::new(), None, None)
    }

    /// Remote control; the front panel stays usable.
    fn set_remote(&mut self) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::RemoteMode, "setRemote", &Args::new(), None, None)
    }

    /// Remote control with the front panel locked.
    fn set_remote_lock(&mut self) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::RemoteMode, "setRemoteLock", &Args::new(), None, None)
    }

    /// Enable the beeper.
    fn beeper_on(&mut self) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Beeper, "beeperOn", &Args::new(), None, None)
    }

    /// Disable the beeper.
    fn beeper_off(&mut self) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Beeper, "beeperOff", &Args::new(), None, None)
    }

    // ------------------------------------------------------------------
    // Output / input
    // ------------------------------------------------------------------

    /// Output state.
    fn is_output_on(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut()
            .fetch_bool(Capability::Output, "isOutput", &Args::new(), channel)
    }

    /// Enable the output.
    fn output_on(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Output, "outputOn", &Args::new(), channel, wait)
    }

    /// Disable the output.
    fn output_off(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Output, "outputOff", &Args::new(), channel, wait)
    }

    /// Enable every output.
    fn output_on_all(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command_all(Capability::Output, "outputOnAll", "outputOn", wait)
    }

    /// Disable every output.
    fn output_off_all(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command_all(Capability::Output, "outputOffAll", "outputOff", wait)
    }

    /// Load input state.
    fn is_input_on(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut()
            .fetch_bool(Capability::Input, "isInput", &Args::new(), channel)
    }

    /// Enable the load input.
    fn input_on(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Input, "inputOn", &Args::new(), channel, wait)
    }

    /// Disable the load input.
    fn input_off(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::Input, "inputOff", &Args::new(), channel, wait)
    }

    // ------------------------------------------------------------------
    // Setpoints
    // ------------------------------------------------------------------

    /// Program the voltage setpoint.
    fn set_voltage(&mut self, voltage: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::VoltageSetpoint, "setVoltage", &Args::value(voltage), channel, wait)
    }

    /// Program the current setpoint.
    fn set_current(&mut self, current: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut()
            .command(Capability::CurrentSetpoint, "setCurrent", &Args::value(current), channel, wait)
    }

    /// Voltage setpoint.
    fn query_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::SetpointReadback, "queryVoltage", &Args::new(), channel)
    }

    /// Current setpoint.
    fn query_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::SetpointReadback, "queryCurrent", &Args::new(), channel)
    }

    /// Select the source function (e.g. `VOLTage`, `CURRent`).
    fn set_function(&mut self, function: &str, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        let args = Args::new().with("function", function);
        self.scpi_mut()
            .command(Capability::SourceFunction, "setFunction", &args, channel, wait)
    }

    /// Source function.
    fn query_function(&mut self, channel: Option<u8>) -> DcpsResult<Option<String>> {
        self.scpi_mut()
            .fetch_string(Capability::SourceFunction, "queryFunction", &Args::new(), channel)
    }

    /// Source voltage range; `None` selects automatic ranging.
    fn set_voltage_range(&mut self, upper: Option<f64>, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().set_range(
            Capability::SourceRange,
            "setVoltageRangeAuto",
            "setVoltageRange",
            upper,
            channel,
            wait,
        )
    }

    /// Source current range; `None` selects automatic ranging.
    fn set_current_range(&mut self, upper: Option<f64>, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().set_range(
            Capability::SourceRange,
            "setCurrentRangeAuto",
            "setCurrentRange",
            upper,
            channel,
            wait,
        )
    }

    /// Source voltage range.
    fn query_voltage_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.scpi_mut().query_range(
            Capability::SourceRange,
            "queryVoltageRangeAuto",
            "queryVoltageRange",
            channel,
        )
    }

    /// Source current range.
    fn query_current_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.scpi_mut().query_range(
            Capability::SourceRange,
            "queryCurrentRangeAuto",
            "queryCurrentRange",
            channel,
        )
    }

    // ------------------------------------------------------------------
    // Measurements
    // ------------------------------------------------------------------

    /// Measured output voltage.
    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::VoltageMeasurement, "measureVoltage", &Args::new(), channel)
    }

    /// Measured output current.
    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::CurrentMeasurement, "measureCurrent", &Args::new(), channel)
    }

    /// Measured output power.
    fn measure_power(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::PowerMeasurement, "measurePower", &Args::new(), channel)
    }

    /// Measured resistance.
    fn measure_resistance(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut().fetch_value(
            Capability::ResistanceMeasurement,
            "measureResistance",
            &Args::new(),
            channel,
        )
    }

    /// Every reading the instrument reports in one go.
    fn measure_all(&mut self, channel: Option<u8>) -> DcpsResult<Option<Vec<f64>>> {
        let reply = self
            .scpi_mut()
            .fetch_string(Capability::VoltageMeasurement, "measureAll", &Args::new(), channel)?;
        reply
            .map(|reply| parse_float_list("measureAll", &reply))
            .transpose()
    }

    /// Peak voltage since the last reset of the statistics.
    fn measure_voltage_max(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::ExtremaMeasurement, "measureVoltageMax", &Args::new(), channel)
    }

    /// Minimum voltage since the last reset of the statistics.
    fn measure_voltage_min(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::ExtremaMeasurement, "measureVoltageMin", &Args::new(), channel)
    }

    /// Peak current since the last reset of the statistics.
    fn measure_current_max(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::ExtremaMeasurement, "measureCurrentMax", &Args::new(), channel)
    }

    /// Minimum current since the last reset of the statistics.
    fn measure_current_min(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::ExtremaMeasurement, "measureCurrentMin", &Args::new(), channel)
    }

    /// Voltage measurement range; `None` selects automatic ranging.
    fn set_measure_voltage_range(
        &mut self,
        upper: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi_mut().set_range(
            Capability::MeasureRange,
            "setMeasureVoltageRangeAuto",
            "setMeasureVoltageRange",
            upper,
            channel,
            wait,
        )
    }

    /// Current measurement range; `None` selects automatic ranging.
    fn set_measure_current_range(
        &mut self,
        upper: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi_mut().set_range(
            Capability::MeasureRange,
            "setMeasureCurrentRangeAuto",
            "setMeasureCurrentRange",
            upper,
            channel,
            wait,
        )
    }

    /// Voltage measurement range.
    fn query_measure_voltage_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.scpi_mut().query_range(
            Capability::MeasureRange,
            "queryMeasureVoltageRangeAuto",
            "queryMeasureVoltageRange",
            channel,
        )
    }

    /// Current measurement range.
    fn query_measure_current_range(&mut self, channel: Option<u8>) -> DcpsResult<Option<RangeSetting>> {
        self.scpi_mut().query_range(
            Capability::MeasureRange,
            "queryMeasureCurrentRangeAuto",
            "queryMeasureCurrentRange",
            channel,
        )
    }

    // ------------------------------------------------------------------
    // Protection
    // ------------------------------------------------------------------

    /// Over-voltage trip level, with an optional trip delay in seconds.
    fn set_voltage_protection(
        &mut self,
        level: f64,
        delay: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi_mut().set_protection(
            Capability::VoltageProtection,
            "setVoltageProtection",
            "setVoltageProtectionDelay",
            level,
            delay,
            channel,
            wait,
        )
    }

    /// Over-voltage trip level.
    fn query_voltage_protection(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut().fetch_value(
            Capability::VoltageProtection,
            "queryVoltageProtection",
            &Args::new(),
            channel,
        )
    }

    /// Arm over-voltage protection.
    fn voltage_protection_on(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::VoltageProtection,
            "voltageProtectionOn",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Disarm over-voltage protection.
    fn voltage_protection_off(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::VoltageProtection,
            "voltageProtectionOff",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Clear a tripped over-voltage condition.
    fn voltage_protection_clear(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::VoltageProtection,
            "voltageProtectionClear",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Whether over-voltage protection has tripped.
    fn is_voltage_protection_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut().fetch_bool(
            Capability::VoltageProtection,
            "isVoltageProtectionTripped",
            &Args::new(),
            channel,
        )
    }

    /// Over-current trip level, with an optional trip delay in seconds.
    fn set_current_protection(
        &mut self,
        level: f64,
        delay: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.scpi_mut().set_protection(
            Capability::CurrentProtection,
            "setCurrentProtection",
            "setCurrentProtectionDelay",
            level,
            delay,
            channel,
            wait,
        )
    }

    /// Over-current trip level.
    fn query_current_protection(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut().fetch_value(
            Capability::CurrentProtection,
            "queryCurrentProtection",
            &Args::new(),
            channel,
        )
    }

    /// Arm over-current protection.
    fn current_protection_on(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::CurrentProtection,
            "currentProtectionOn",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Disarm over-current protection.
    fn current_protection_off(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::CurrentProtection,
            "currentProtectionOff",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Clear a tripped over-current condition.
    fn current_protection_clear(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::CurrentProtection,
            "currentProtectionClear",
            &Args::new(),
            channel,
            wait,
        )
    }

    /// Whether over-current protection has tripped.
    fn is_current_protection_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut().fetch_bool(
            Capability::CurrentProtection,
            "isCurrentProtectionTripped",
            &Args::new(),
            channel,
        )
    }

    // ------------------------------------------------------------------
    // Compliance (source meters)
    // ------------------------------------------------------------------

    /// Voltage compliance limit while sourcing current.
    fn set_voltage_compliance(&mut self, level: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::Compliance,
            "setVoltageCompliance",
            &Args::value(level),
            channel,
            wait,
        )
    }

    /// Voltage compliance limit.
    fn query_voltage_compliance(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::Compliance, "queryVoltageCompliance", &Args::new(), channel)
    }

    /// Whether the voltage compliance limit is in effect.
    fn is_voltage_compliance_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut().fetch_bool(
            Capability::Compliance,
            "isVoltageComplianceTripped",
            &Args::new(),
            channel,
        )
    }

    /// Current compliance limit while sourcing voltage.
    fn set_current_compliance(&mut self, level: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi_mut().command(
            Capability::Compliance,
            "setCurrentCompliance",
            &Args::value(level),
            channel,
            wait,
        )
    }

    /// Current compliance limit.
    fn query_current_compliance(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi_mut()
            .fetch_value(Capability::Compliance, "queryCurrentCompliance", &Args::new(), channel)
    }

    /// Whether the current compliance limit is in effect.
    fn is_current_compliance_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi_mut().fetch_bool(
            Capability::Compliance,
            "isCurrentComplianceTripped",
            &Args::new(),
            channel,
        )
    }
}

/// Instruments with a user message area on the front panel display.
pub trait FrontPanelText: PowerSupply {
    /// Show the user message in the top (`true`) or bottom display area.
    fn display_message_on(&mut self, top: bool) -> DcpsResult<()>;

    /// Hide the user message.
    fn display_message_off(&mut self, top: bool) -> DcpsResult<()>;

    /// Set the user message text. Text longer than the display area is clipped.
    fn set_display_message(&mut self, message: &str, top: bool) -> DcpsResult<()>;
}

/// Clip `message` to `max` characters, logging when text is dropped.
pub(crate) fn clip_message(message: &str, max: usize) -> String {
    if message.chars().count() > max {
        warn!("Display message '{}' clipped to {} characters", message, max);
        message.chars().take(max).collect()
    } else {
        message.to_string()
    }
}

/// Log an operation the model cannot perform.
pub(crate) fn unsupported(model: &str, operation: &str) {
    warn!("{} does not support {}; ignoring", model, operation);
}
