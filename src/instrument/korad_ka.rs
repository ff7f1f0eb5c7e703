//! KORAD KA series and rebadged compatibles (Velleman, Tenma, RS Pro).
//!
//! These supplies speak a terse non-SCPI protocol: no terminators, fixed-width
//! numeric arguments and fixed-length binary replies. Only `*IDN?` is standard,
//! so most [`PowerSupply`] methods are overridden here.

use super::{unsupported, PowerSupply};
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{parse_float, Args, Capability, CommandTable, DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    let overrides = CommandTable::new().disabled(&[
        "chanSelect",
        "rst",
        "cls",
        "opc",
        "opcQuery",
        "errorQuery",
    ]);

    Arc::new(
        DriverProfile::new("KORAD KA")
            .terminations("", Some("\0"))
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
                Capability::SourceFunction,
                Capability::MeasureRange,
            ])
            .resource("KA_SERIES_VISA", "ASRL1::INSTR"),
    )
});

/// Regulation mode of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationMode {
    /// Constant current.
    ConstantCurrent,
    /// Constant voltage.
    ConstantVoltage,
}

/// Channel coupling of multi-channel models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// Channels are independent.
    Independent,
    /// Channels in series.
    Series,
    /// Channels in parallel.
    Parallel,
    /// Reserved bit pattern.
    Undefined,
}

/// Decoded `STATUS?` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KoradStatus {
    /// Channel 1 regulation mode.
    pub ch1_mode: RegulationMode,
    /// Channel 2 regulation mode.
    pub ch2_mode: RegulationMode,
    /// Channel coupling.
    pub tracking: Tracking,
    /// Beeper enabled.
    pub beeper: bool,
    /// Front panel locked.
    pub lock: bool,
    /// Output enabled.
    pub output: bool,
}

impl From<u8> for KoradStatus {
    fn from(byte: u8) -> Self {
        let mode = |bit: u8| {
            if byte & (1 << bit) != 0 {
                RegulationMode::ConstantVoltage
            } else {
                RegulationMode::ConstantCurrent
            }
        };
        let tracking = match (byte & 0b0000_1100) >> 2 {
            0b00 => Tracking::Independent,
            0b01 => Tracking::Series,
            0b11 => Tracking::Parallel,
            _ => Tracking::Undefined,
        };
        Self {
            ch1_mode: mode(0),
            ch2_mode: mode(1),
            tracking,
            beeper: byte & 0b0001_0000 != 0,
            lock: byte & 0b0010_0000 != 0,
            output: byte & 0b0100_0000 != 0,
        }
    }
}

/// KORAD KA series power supply.
#[derive(Debug)]
pub struct KoradKa {
    scpi: Scpi,
}

impl KoradKa {
    /// Single-channel supply at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Multi-channel model such as the KA3305.
    pub fn with_channels(resource: impl Into<String>, channels: u8) -> DcpsResult<Self> {
        Ok(Self::from_session(
            Scpi::new(Self::profile(), resource).with_channels(channels)?,
        ))
    }

    /// Supply addressed by `KA_SERIES_VISA`.
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

    /// Read and decode the status byte.
    pub fn status(&mut self) -> DcpsResult<KoradStatus> {
        // A stale byte would shift every later fixed-length reply.
        self.scpi.clear_input()?;
        let reply = self.scpi.query_bytes("STATUS?", &Args::new(), 1)?;
        reply
            .first()
            .copied()
            .map(KoradStatus::from)
            .ok_or_else(|| DcpsError::parse("STATUS?", "", "empty status reply"))
    }

    /// Query `count` bytes and parse the first `keep` as a number.
    fn query_setpoint(&mut self, template: &str, count: usize, keep: usize) -> DcpsResult<f64> {
        let bytes = self.scpi.query_bytes(template, &Args::new(), count)?;
        let text = String::from_utf8_lossy(&bytes[..keep.min(bytes.len())]).into_owned();
        parse_float(template, &text)
    }
}

impl PowerSupply for KoradKa {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }

    fn set_local(&mut self) -> DcpsResult<()> {
        unsupported(self.model(), "set_local");
        Ok(())
    }

    /// The supply goes remote on any traffic.
    fn set_remote(&mut self) -> DcpsResult<()> {
        self.scpi.write_raw("\n")
    }

    fn set_remote_lock(&mut self) -> DcpsResult<()> {
        self.set_remote()
    }

    fn beeper_on(&mut self) -> DcpsResult<()> {
        self.scpi.write_raw("BEEP1")
    }

    fn beeper_off(&mut self) -> DcpsResult<()> {
        self.scpi.write_raw("BEEP0")
    }

    // All channels switch together; `channel` only updates the current channel.
    fn is_output_on(&mut self, channel: Option<u8>) -> DcpsResult<Option<bool>> {
        self.scpi.use_channel(channel)?;
        Ok(Some(self.status()?.output))
    }

    fn output_on(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        self.scpi.write_raw("OUT1")?;
        self.scpi.settle(wait)
    }

    fn output_off(&mut self, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        self.scpi.write_raw("OUT0")?;
        self.scpi.settle(wait)
    }

    fn output_on_all(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.output_on(None, wait)
    }

    fn output_off_all(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        self.output_off(None, wait)
    }

    fn set_voltage(&mut self, voltage: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let command = format!("VSET{}:{:05.2}", self.scpi.channel(), voltage);
        self.scpi.write_raw(&command)?;
        self.scpi.settle(wait)
    }

    fn set_current(&mut self, current: f64, channel: Option<u8>, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.use_channel(channel)?;
        let command = format!("ISET{}:{:05.3}", self.scpi.channel(), current);
        self.scpi.write_raw(&command)?;
        self.scpi.settle(wait)
    }

    fn query_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        self.query_setpoint("VSET{ch}?", 5, 5).map(Some)
    }

    // Firmware appends a sixth garbage byte to the current reply.
    fn query_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        self.scpi.use_channel(channel)?;
        self.query_setpoint("ISET{ch}?", 6, 5).map(Some)
    }

    fn measure_voltage(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        unsupported(self.model(), "measuring voltage (returning the setpoint)");
        self.query_voltage(channel)
    }

    fn measure_current(&mut self, channel: Option<u8>) -> DcpsResult<Option<f64>> {
        unsupported(self.model(), "measuring current (returning the setpoint)");
        self.query_current(channel)
    }
}
