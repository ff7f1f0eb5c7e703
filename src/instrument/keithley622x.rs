//! Keithley/Tektronix 622x precision current sources over a GPIB bridge.

use super::{clip_message, unsupported, FrontPanelText, PowerSupply};
use crate::error::DcpsResult;
use crate::scpi::{parse_bool, Args, Capability, CommandTable, DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::from_entries(&[
        // Range first so the level is never clipped by the previous range.
        ("setCurrent", "SOURce:CURRent:RANGe {value}\nSOURce:CURRent {value}"),
        // Compliance voltage is the closest analogue to over-voltage protection.
        ("setVoltageProtection", "SOURce:CURRent:COMPliance {value}"),
    ]);

    Arc::new(
        DriverProfile::new("Keithley 622x")
            .overrides(overrides)
            .wait(Duration::from_millis(250))
            .query_delay(Duration::from_millis(750))
            .timeout(Duration::from_secs(2))
            .gpib(12, 600, Duration::from_millis(1500))
            .without(&[
                Capability::VoltageSetpoint,
                Capability::SetpointReadback,
                Capability::VoltageMeasurement,
                Capability::CurrentMeasurement,
                Capability::PowerMeasurement,
                Capability::ResistanceMeasurement,
                Capability::ExtremaMeasurement,
                Capability::CurrentProtection,
                Capability::Compliance,
                Capability::MeasureRange,
                Capability::SourceFunction,
                Capability::Input,
            ])
            .resource("K622X_VISA", "TCPIP0::192.168.1.20::23::SOCKET"),
    )
});

/// Keithley 6220/6221 current source.
///
/// Prologix bridges are recommended; KISS-488 works for most commands.
#[derive(Debug)]
pub struct Keithley622x {
    scpi: Scpi,
}

impl Keithley622x {
    /// Source at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Source addressed by `K622X_VISA`.
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

    /// True if the output interlock is open.
    pub fn is_interlock_tripped(&mut self) -> DcpsResult<bool> {
        // The instrument reports 0 when tripped.
        let reply = self.scpi.query("OUTP:INT:TRIP?", &Args::new(), None)?;
        Ok(!parse_bool(&reply))
    }
}

impl PowerSupply for Keithley622x {
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

    fn set_voltage(&mut self, _voltage: f64, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        unsupported(self.model(), "setting a voltage (use set_voltage_protection for compliance)");
        Ok(())
    }

    fn set_current(&mut self, current: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        let args = Args::new().with("value", format!("{:.2e}", current));
        self.scpi
            .command(Capability::CurrentSetpoint, "setCurrent", &args, channel, wait)
    }

    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        unsupported(self.model(), "measurements");
        Ok(None)
    }

    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        unsupported(self.model(), "measurements");
        Ok(None)
    }

    fn query_voltage_protection(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        Ok(None)
    }

    // Compliance is always active.
    fn voltage_protection_on(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }

    fn voltage_protection_off(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }

    fn voltage_protection_clear(&mut self, channel: Option<u8>, _wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel).map(drop)
    }

    /// The instrument cannot report reaching compliance, so this always answers
    /// `Some(true)` to make callers look closer.
    fn is_voltage_protection_tripped(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi.use_channel(channel)?;
        Ok(Some(true))
    }
}

impl FrontPanelText for Keithley622x {
    fn display_message_on(&mut self, top: bool) -> DcpsResult<()> {
        self.scpi
            .send_literal(if top { "DISP:TEXT:STAT ON" } else { "DISP:WIND2:TEXT:STAT ON" })
    }

    fn display_message_off(&mut self, top: bool) -> DcpsResult<()> {
        self.scpi
            .send_literal(if top { "DISP:TEXT:STAT OFF" } else { "DISP:WIND2:TEXT:STAT OFF" })
    }

    fn set_display_message(&mut self, message: &str, top: bool) -> DcpsResult<()> {
        let command = if top {
            format!("DISP:TEXT \"{}\"", clip_message(message, 20))
        } else {
            format!("DISP:WIND2:TEXT \"{}\"", clip_message(message, 32))
        };
        self.scpi.send_literal(&command)
    }
}
