//! Plain SCPI instrument using the base command table unchanged.

use super::PowerSupply;
use crate::error::DcpsResult;
use crate::scpi::{DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    Arc::new(DriverProfile::new("Generic SCPI").resource("DCPS_RESOURCE", "TCPIP0::192.168.1.100::5025::SOCKET"))
});

/// Any instrument that follows the SCPI base table.
#[derive(Debug)]
pub struct GenericScpi {
    scpi: Scpi,
}

impl GenericScpi {
    /// Single-channel instrument at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Multi-channel instrument at `resource`.
    ///
    /// # Errors
    ///
    /// [`crate::DcpsError::InvalidArgument`] for zero channels.
    pub fn with_channels(resource: impl Into<String>, channels: u8) -> DcpsResult<Self> {
        Ok(Self::from_session(
            Scpi::new(Self::profile(), resource).with_channels(channels)?,
        ))
    }

    /// Instrument with a custom profile (prefix, terminators, overrides).
    pub fn with_profile(profile: DriverProfile, resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Arc::new(profile), resource))
    }

    /// Instrument addressed by `DCPS_RESOURCE`.
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

impl PowerSupply for GenericScpi {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }
}
