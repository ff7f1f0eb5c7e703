//! Instrument configuration using Figment
//!
//! Configuration is loaded from a TOML file merged with `DCPS_`-prefixed environment
//! variables. Nested keys use a double underscore:
//!
//! ```text
//! DCPS_INSTRUMENTS__BENCH__RESOURCE=TCPIP0::10.0.0.5::5025::SOCKET
//! DCPS_INSTRUMENTS__BENCH__WAIT=250ms
//! ```
//!
//! A file describes one or more named instruments:
//!
//! ```toml
//! [instruments.bench]
//! driver = "aim_tti_plp"
//! resource = "TCPIP0::192.168.1.100::INSTR"
//! wait = "500ms"
//!
//! [instruments.smu]
//! driver = "keithley2400"
//! gpib_address = 24
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dcps::config::DcpsConfig;
//! use dcps::instrument::registry;
//!
//! fn main() -> dcps::DcpsResult<()> {
//!     let config = DcpsConfig::load_from("dcps.toml")?;
//!     let mut psu = registry::connect(config.instrument("bench")?)?;
//!     println!("{}", psu.idn()?);
//!     Ok(())
//! }
//! ```

use crate::error::{DcpsError, DcpsResult};
use crate::instrument::DriverKind;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Highest primary address on a GPIB bus.
const MAX_GPIB_ADDRESS: u8 = 30;

/// Settings for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSettings {
    /// Which driver to use.
    pub driver: DriverKind,
    /// Resource string; falls back to the driver's environment variable, then its
    /// default address.
    #[serde(default)]
    pub resource: Option<String>,
    /// Settling delay after each command.
    #[serde(default, with = "humantime_serde")]
    pub wait: Option<Duration>,
    /// Read timeout.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Delay between a query and reading its reply.
    #[serde(default, with = "humantime_serde")]
    pub query_delay: Option<Duration>,
    /// Channel count, for models sold in several variants.
    #[serde(default)]
    pub channels: Option<u8>,
    /// GPIB address behind a KISS-488 or Prologix bridge.
    #[serde(default)]
    pub gpib_address: Option<u8>,
    /// Rewrite VXI-11 discovery addresses to the raw socket port (Aim TTi).
    #[serde(default = "default_true")]
    pub rewrite_resource: bool,
    /// Log a warning when the address is rewritten.
    #[serde(default = "default_true")]
    pub warn_on_rewrite: bool,
}

fn default_true() -> bool {
    true
}

impl InstrumentSettings {
    /// Driver defaults for everything.
    pub fn new(driver: DriverKind) -> Self {
        Self {
            driver,
            resource: None,
            wait: None,
            timeout: None,
            query_delay: None,
            channels: None,
            gpib_address: None,
            rewrite_resource: true,
            warn_on_rewrite: true,
        }
    }

    /// Resource to open: the configured one, else the driver's environment variable,
    /// else the driver default.
    pub fn resource_or_env(&self) -> String {
        match &self.resource {
            Some(resource) => resource.clone(),
            None => self.driver.profile().resource_from_env(),
        }
    }

    fn validate(&self, name: &str) -> DcpsResult<()> {
        if let Some(resource) = &self.resource {
            if resource.trim().is_empty() {
                return Err(DcpsError::Validation(format!(
                    "Instrument '{}': 'resource' cannot be empty",
                    name
                )));
            }
        }
        if let Some(channels) = self.channels {
            self.driver.check_channels(channels).map_err(|e| {
                DcpsError::Validation(format!("Instrument '{}': {}", name, e))
            })?;
        }
        if let Some(address) = self.gpib_address {
            if address > MAX_GPIB_ADDRESS {
                return Err(DcpsError::Validation(format!(
                    "Instrument '{}': invalid gpib_address {}. Must be 0-{}",
                    name, address, MAX_GPIB_ADDRESS
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DcpsConfig {
    /// Instruments by name.
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentSettings>,
}

impl DcpsConfig {
    /// Load `dcps.toml` from the working directory plus the environment.
    pub fn load() -> DcpsResult<Self> {
        Self::load_from("dcps.toml")
    }

    /// Load from a specific file plus the environment, then validate.
    ///
    /// # Errors
    ///
    /// [`DcpsError::Config`] if extraction fails (unknown driver, malformed duration,
    /// wrong type), [`DcpsError::Validation`] if a value is out of range.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DcpsResult<Self> {
        Self::from_figment(Self::figment(path))
    }

    /// The provider stack used by [`DcpsConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DCPS_").split("__"))
    }

    /// Extract and validate from any figment.
    pub fn from_figment(figment: Figment) -> DcpsResult<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every instrument.
    pub fn validate(&self) -> DcpsResult<()> {
        for (name, settings) in &self.instruments {
            settings.validate(name)?;
        }
        Ok(())
    }

    /// Settings of the instrument called `name`.
    pub fn instrument(&self, name: &str) -> DcpsResult<&InstrumentSettings> {
        self.instruments
            .get(name)
            .ok_or_else(|| DcpsError::Validation(format!("No instrument named '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[instruments.bench]
driver = "aim_tti_plp"
resource = "TCPIP0::192.168.1.100::INSTR"
wait = "500ms"
warn_on_rewrite = false

[instruments.smu]
driver = "keithley2400"
gpib_address = 24
query_delay = "1s 200ms"
"#
        )
        .unwrap();

        let config = DcpsConfig::from_figment(Figment::from(Toml::file(file.path()))).unwrap();
        let bench = config.instrument("bench").unwrap();
        assert_eq!(bench.driver, DriverKind::AimTtiPlp);
        assert_eq!(bench.wait, Some(Duration::from_millis(500)));
        assert!(bench.rewrite_resource);
        assert!(!bench.warn_on_rewrite);

        let smu = config.instrument("smu").unwrap();
        assert_eq!(smu.gpib_address, Some(24));
        assert_eq!(smu.query_delay, Some(Duration::from_millis(1200)));
        assert_eq!(smu.resource, None);
        assert!(config.instrument("missing").is_err());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = DcpsConfig::default();
        let mut settings = InstrumentSettings::new(DriverKind::Generic);
        settings.gpib_address = Some(31);
        config.instruments.insert("x".into(), settings.clone());
        assert!(matches!(config.validate(), Err(DcpsError::Validation(_))));

        settings.gpib_address = None;
        settings.channels = Some(0);
        config.instruments.insert("x".into(), settings.clone());
        assert!(config.validate().is_err());

        settings.channels = Some(2);
        config.instruments.insert("x".into(), settings.clone());
        assert!(config.validate().is_ok());

        let mut fixed = InstrumentSettings::new(DriverKind::Keithley6500);
        fixed.channels = Some(2);
        config.instruments.insert("dmm".into(), fixed);
        assert!(matches!(config.validate(), Err(DcpsError::Validation(msg)) if msg.contains("dmm")));
        config.instruments.remove("dmm");

        settings.channels = None;
        settings.resource = Some("  ".into());
        config.instruments.insert("x".into(), settings);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_driver_is_a_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("dcps.toml", "[instruments.x]\ndriver = \"hp6632\"\n")?;
            let err = DcpsConfig::load_from("dcps.toml").unwrap_err();
            assert!(matches!(err, DcpsError::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "dcps.toml",
                "[instruments.load]\ndriver = \"rigol_dl3000\"\nresource = \"TCPIP0::10.0.0.1::INSTR\"\n",
            )?;
            jail.set_env("DCPS_INSTRUMENTS__LOAD__RESOURCE", "TCPIP0::10.0.0.2::INSTR");
            jail.set_env("DCPS_INSTRUMENTS__LOAD__WAIT", "20ms");
            let config = DcpsConfig::load_from("dcps.toml").unwrap();
            let load = config.instrument("load").unwrap();
            assert_eq!(load.resource.as_deref(), Some("TCPIP0::10.0.0.2::INSTR"));
            assert_eq!(load.wait, Some(Duration::from_millis(20)));
            Ok(())
        });
    }

    #[test]
    fn test_resource_falls_back_to_driver_environment() {
        Jail::expect_with(|jail| {
            let settings = InstrumentSettings::new(DriverKind::Bk9115);
            assert_eq!(settings.resource_or_env(), "USB0::INSTR");
            jail.set_env("BK9115_USB", "USB0::0xFFFF::0x9115::INSTR");
            assert_eq!(settings.resource_or_env(), "USB0::0xFFFF::0x9115::INSTR");
            Ok(())
        });
    }
}
