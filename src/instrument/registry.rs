//! Build drivers from configuration.
//!
//! Each [`DriverKind`] maps to one vendor driver. [`build`] creates an unopened
//! driver from [`InstrumentSettings`], applying the per-instrument overrides on top
//! of the driver's profile; [`connect`] also opens it.

use super::{
    AimTtiPlp, Bk9115, GenericScpi, It6500c, Keithley2182, Keithley2400, Keithley622x,
    Keithley6500, KeysightE364xA, KoradKa, PowerSupply, RigolDl3000,
};
use crate::config::InstrumentSettings;
use crate::error::{DcpsError, DcpsResult};
use crate::scpi::{DriverProfile, Scpi};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Driver selector used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverKind {
    /// Any SCPI supply, base command table only.
    #[serde(rename = "generic")]
    Generic,
    /// Aim TTi PL-P/CPX series.
    #[serde(rename = "aim_tti_plp")]
    AimTtiPlp,
    /// B&K Precision 9115.
    #[serde(rename = "bk9115")]
    Bk9115,
    /// Keysight/Agilent E364xA behind a KISS-488 bridge.
    #[serde(rename = "keysight_e364xa")]
    KeysightE364xA,
    /// Keithley 6220/6221 current source.
    #[serde(rename = "keithley622x")]
    Keithley622x,
    /// Keithley 2182 nanovoltmeter.
    #[serde(rename = "keithley2182")]
    Keithley2182,
    /// Keithley 2400 SourceMeter.
    #[serde(rename = "keithley2400")]
    Keithley2400,
    /// Keithley DMM6500.
    #[serde(rename = "keithley6500")]
    Keithley6500,
    /// Rigol DL3000 electronic load.
    #[serde(rename = "rigol_dl3000")]
    RigolDl3000,
    /// ITECH IT6500C.
    #[serde(rename = "it6500c")]
    It6500c,
    /// KORAD KA series.
    #[serde(rename = "korad_ka")]
    KoradKa,
}

impl DriverKind {
    /// Every driver.
    pub const ALL: [DriverKind; 11] = [
        DriverKind::Generic,
        DriverKind::AimTtiPlp,
        DriverKind::Bk9115,
        DriverKind::KeysightE364xA,
        DriverKind::Keithley622x,
        DriverKind::Keithley2182,
        DriverKind::Keithley2400,
        DriverKind::Keithley6500,
        DriverKind::RigolDl3000,
        DriverKind::It6500c,
        DriverKind::KoradKa,
    ];

    /// Profile of the driver.
    pub fn profile(self) -> Arc<DriverProfile> {
        match self {
            DriverKind::Generic => GenericScpi::profile(),
            DriverKind::AimTtiPlp => AimTtiPlp::profile(),
            DriverKind::Bk9115 => Bk9115::profile(),
            DriverKind::KeysightE364xA => KeysightE364xA::profile(),
            DriverKind::Keithley622x => Keithley622x::profile(),
            DriverKind::Keithley2182 => Keithley2182::profile(),
            DriverKind::Keithley2400 => Keithley2400::profile(),
            DriverKind::Keithley6500 => Keithley6500::profile(),
            DriverKind::RigolDl3000 => RigolDl3000::profile(),
            DriverKind::It6500c => It6500c::profile(),
            DriverKind::KoradKa => KoradKa::profile(),
        }
    }

    /// Whether the channel count depends on the model variant. Other drivers address
    /// a fixed set of channels.
    pub fn variable_channels(self) -> bool {
        matches!(self, DriverKind::Generic | DriverKind::KoradKa)
    }

    /// Check a configured channel count against what the driver can address.
    pub fn check_channels(self, channels: u8) -> DcpsResult<()> {
        let fixed = self.profile().channels;
        if channels == 0 {
            return Err(DcpsError::invalid_argument("channels", "must be at least 1"));
        }
        if !self.variable_channels() && channels != fixed {
            return Err(DcpsError::invalid_argument(
                "channels",
                format!("{} has {} channel(s), not {}", self, fixed, channels),
            ));
        }
        Ok(())
    }

    /// Environment variable holding the address of this kind of instrument.
    pub fn resource_env(self) -> &'static str {
        self.profile().resource_env
    }

    /// Address used when neither configuration nor environment name one.
    pub fn default_resource(self) -> &'static str {
        self.profile().default_resource
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().model)
    }
}

/// Configure a session from `settings`: resource, then any overridden defaults.
fn session(kind: DriverKind, settings: &InstrumentSettings) -> DcpsResult<Scpi> {
    let mut resource = settings.resource_or_env();
    if kind == DriverKind::AimTtiPlp {
        resource = AimTtiPlp::resolve_resource(resource, settings.rewrite_resource, settings.warn_on_rewrite);
    }

    let mut scpi = Scpi::new(kind.profile(), resource);
    if let Some(channels) = settings.channels {
        kind.check_channels(channels)?;
        if kind.variable_channels() {
            scpi = scpi.with_channels(channels)?;
        }
    }
    if let Some(wait) = settings.wait {
        scpi = scpi.with_wait(wait);
    }
    if let Some(timeout) = settings.timeout {
        scpi = scpi.with_timeout(timeout);
    }
    if let Some(delay) = settings.query_delay {
        scpi = scpi.with_query_delay(Some(delay));
    }
    if let Some(address) = settings.gpib_address {
        scpi = scpi.with_gpib_address(address);
    }
    Ok(scpi)
}

/// Create an unopened driver.
///
/// # Errors
///
/// [`crate::DcpsError::InvalidArgument`] for a zero channel count.
pub fn build(settings: &InstrumentSettings) -> DcpsResult<Box<dyn PowerSupply>> {
    let kind = settings.driver;
    let scpi = session(kind, settings)?;
    debug!("Building {} driver for {}", kind, scpi.resource());
    let driver: Box<dyn PowerSupply> = match kind {
        DriverKind::Generic => Box::new(GenericScpi::from_session(scpi)),
        DriverKind::AimTtiPlp => Box::new(AimTtiPlp::from_session(scpi)),
        DriverKind::Bk9115 => Box::new(Bk9115::from_session(scpi)),
        DriverKind::KeysightE364xA => Box::new(KeysightE364xA::from_session(scpi)),
        DriverKind::Keithley622x => Box::new(Keithley622x::from_session(scpi)),
        DriverKind::Keithley2182 => Box::new(Keithley2182::from_session(scpi)),
        DriverKind::Keithley2400 => Box::new(Keithley2400::from_session(scpi)),
        DriverKind::Keithley6500 => Box::new(Keithley6500::from_session(scpi)),
        DriverKind::RigolDl3000 => Box::new(RigolDl3000::from_session(scpi)),
        DriverKind::It6500c => Box::new(It6500c::from_session(scpi)),
        DriverKind::KoradKa => Box::new(KoradKa::from_session(scpi)),
    };
    Ok(driver)
}

/// Create and open a driver.
pub fn connect(settings: &InstrumentSettings) -> DcpsResult<Box<dyn PowerSupply>> {
    let mut driver = build(settings)?;
    driver.open()?;
    Ok(driver)
}
