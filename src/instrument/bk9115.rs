//! B&K Precision 9115 DC power supply.

use super::PowerSupply;
use crate::scpi::{DriverProfile, Scpi};
use once_cell::sync::Lazy;
use std::sync::Arc;

static PROFILE: Lazy<Arc<DriverProfile>> = Lazy::new(|| {
    Arc::new(
        DriverProfile::new("BK 9115")
            .terminations("\r\n", None)
            .resource("BK9115_USB", "USB0::INSTR"),
    )
});

/// B&K Precision 9115. Speaks the SCPI base table; writes end in CR/LF.
#[derive(Debug)]
pub struct Bk9115 {
    scpi: Scpi,
}

impl Bk9115 {
    /// Supply at `resource`.
    pub fn new(resource: impl Into<String>) -> Self {
        Self::from_session(Scpi::new(Self::profile(), resource))
    }

    /// Supply addressed by `BK9115_USB`.
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

impl PowerSupply for Bk9115 {
    fn scpi(&self) -> &Scpi {
        &self.scpi
    }

    fn scpi_mut(&mut self) -> &mut Scpi {
        &mut self.scpi
    }
}
