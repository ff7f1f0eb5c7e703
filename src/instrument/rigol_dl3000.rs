//! Rigol DL3000 series electronic load.

use super::PowerSupply;
use crate::error::DcpsResult;
use crate::scpi::{Args, CommandTable, DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    Arc::new(
        DriverProfile::new("Rigol DL3000")
            .prefix(":")
            .overrides(CommandTable::new().disabled(&["beeperOn", "beeperOff"]))
            .resource("DL3000_IP", "TCPIP0::172.16.2.13::INSTR"),
    )
});

/// Rigol DL3000 electronic load. Commands carry a `:` prefix; the beeper cannot be
/// controlled remotely.
#[derive(Debug)]
pub struct RigolDl3000 {
    scpi: Scpi,
}

impl RigolDl3000 {
    /// Load at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Load addressed by `DL3000_IP`.
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

    /// Voltage at which the load starts sinking in constant current mode.
    pub fn set_current_von(&mut self, voltage: f64, wait: Option<Duration>) -> DcpsResult<()> {
        self.scpi.send("SOURce:CURRent:VON {value}", &Args::value(voltage))?;
        self.scpi.settle(wait)
    }

    /// Constant current start voltage.
    pub fn query_current_von(&mut self) -> DcpsResult<f64> {
        self.scpi.query_value("SOURce:CURRent:VON?", &Args::new())
    }
}

impl PowerSupply for RigolDl3000 {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }
}
