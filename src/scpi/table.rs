//! Command tables and two-tier resolution.
//!
//! An operation key such as `setVoltage` maps to a command template. Each driver
//! profile may carry an override table consulted before [`SCPI_BASE`]. An override
//! entry of `None` marks an operation the instrument has no equivalent for; callers
//! skip it instead of sending an empty line.
//!
//! Templates use named slots filled at dispatch time:
//!
//! | slot | contents |
//! |---|---|
//! | `{ch}` | current channel number |
//! | `{value}` | numeric argument |
//! | `{delay}` | protection delay |
//! | `{state}` | `ON`/`OFF` |
//! | `{function}` | source/measure function name |
//!
//! A leading `-` strips the command prefix for that one command; a leading `*` or
//! `++` never receives the prefix.

use crate::error::{DcpsError, DcpsResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Template as stored in a table.
pub type Template = &'static str;

/// Immutable key to template mapping.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: HashMap<&'static str, Option<Template>>,
}

impl CommandTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table from `(key, template)` pairs.
    pub fn from_entries(entries: &[(&'static str, Template)]) -> Self {
        Self {
            entries: entries.iter().map(|(k, t)| (*k, Some(*t))).collect(),
        }
    }

    /// Add or replace an entry.
    pub fn with(mut self, key: &'static str, template: Template) -> Self {
        self.entries.insert(key, Some(template));
        self
    }

    /// Mark `keys` as having no equivalent on this instrument.
    pub fn disabled(mut self, keys: &[&'static str]) -> Self {
        for key in keys {
            self.entries.insert(key, None);
        }
        self
    }

    /// `None` if the key is absent, `Some(None)` if it is disabled.
    pub fn get(&self, key: &str) -> Option<Option<Template>> {
        self.entries.get(key).copied()
    }

    /// Number of entries, disabled ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, unordered.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

/// Look `key` up in `overrides` first, then in `base`.
///
/// # Errors
///
/// [`DcpsError::UnknownCommand`] when neither table knows the key.
pub fn resolve(
    base: &CommandTable,
    overrides: Option<&CommandTable>,
    key: &str,
) -> DcpsResult<Option<Template>> {
    lookup(base, overrides, key).ok_or_else(|| DcpsError::UnknownCommand(key.to_string()))
}

/// Like [`resolve`] but reports an unknown key as `None`.
pub fn lookup(
    base: &CommandTable,
    overrides: Option<&CommandTable>,
    key: &str,
) -> Option<Option<Template>> {
    overrides
        .and_then(|table| table.get(key))
        .or_else(|| base.get(key))
}

/// Generic SCPI mappings shared by every driver.
pub static SCPI_BASE: Lazy<CommandTable> = Lazy::new(|| {
    CommandTable::from_entries(&[
        ("chanSelect", "INSTrument:NSELect {ch}"),
        ("idn", "*IDN?"),
        ("rst", "*RST"),
        ("cls", "*CLS"),
        ("opc", "*OPC"),
        ("opcQuery", "*OPC?"),
        ("errorQuery", "SYSTem:ERRor?"),
        ("setLocal", "SYSTem:LOCal"),
        ("setRemote", "SYSTem:REMote"),
        ("setRemoteLock", "SYSTem:RWLock ON"),
        ("beeperOn", "SYSTem:BEEPer:STATe ON"),
        ("beeperOff", "SYSTem:BEEPer:STATe OFF"),
        ("isOutput", "OUTPut:STATe?"),
        ("outputOn", "OUTPut:STATe ON"),
        ("outputOff", "OUTPut:STATe OFF"),
        ("isInput", "INPut:STATe?"),
        ("inputOn", "INPut:STATe ON"),
        ("inputOff", "INPut:STATe OFF"),
        ("setVoltage", "SOURce:VOLTage:LEVel:IMMediate:AMPLitude {value}"),
        ("setCurrent", "SOURce:CURRent:LEVel:IMMediate:AMPLitude {value}"),
        ("queryVoltage", "SOURce:VOLTage:LEVel:IMMediate:AMPLitude?"),
        ("queryCurrent", "SOURce:CURRent:LEVel:IMMediate:AMPLitude?"),
        ("setFunction", "SOURce{ch}:FUNCtion:MODE {function}"),
        ("queryFunction", "SOURce{ch}:FUNCtion:MODE?"),
        ("measureVoltage", "MEASure:VOLTage:DC?"),
        ("measureCurrent", "MEASure:CURRent:DC?"),
        ("measurePower", "MEASure:POWer:DC?"),
        ("measureResistance", "MEASure:RESistance?"),
        ("measureAll", "MEASure:ALL:DC?"),
        ("measureVoltageMax", "MEASure:VOLTage:MAXimum?"),
        ("measureVoltageMin", "MEASure:VOLTage:MINimum?"),
        ("measureCurrentMax", "MEASure:CURRent:MAXimum?"),
        ("measureCurrentMin", "MEASure:CURRent:MINimum?"),
        ("setVoltageProtection", "SOURce:VOLTage:PROTection:LEVel {value}"),
        ("setVoltageProtectionDelay", "SOURce:VOLTage:PROTection:DELay {delay}"),
        ("queryVoltageProtection", "SOURce:VOLTage:PROTection:LEVel?"),
        ("voltageProtectionOn", "SOURce:VOLTage:PROTection:STATe ON"),
        ("voltageProtectionOff", "SOURce:VOLTage:PROTection:STATe OFF"),
        ("voltageProtectionClear", "SOURce:VOLTage:PROTection:CLEar"),
        ("isVoltageProtectionTripped", "SOURce:VOLTage:PROTection:TRIPped?"),
        ("setCurrentProtection", "SOURce:CURRent:PROTection:LEVel {value}"),
        ("setCurrentProtectionDelay", "SOURce:CURRent:PROTection:DELay {delay}"),
        ("queryCurrentProtection", "SOURce:CURRent:PROTection:LEVel?"),
        ("currentProtectionOn", "SOURce:CURRent:PROTection:STATe ON"),
        ("currentProtectionOff", "SOURce:CURRent:PROTection:STATe OFF"),
        ("currentProtectionClear", "SOURce:CURRent:PROTection:CLEar"),
        ("isCurrentProtectionTripped", "SOURce:CURRent:PROTection:TRIPped?"),
        ("setVoltageCompliance", "SENSe:VOLTage:PROTection:LEVel {value}"),
        ("queryVoltageCompliance", "SENSe:VOLTage:PROTection:LEVel?"),
        ("isVoltageComplianceTripped", "SENSe:VOLTage:PROTection:TRIPped?"),
        ("setCurrentCompliance", "SENSe:CURRent:PROTection:LEVel {value}"),
        ("queryCurrentCompliance", "SENSe:CURRent:PROTection:LEVel?"),
        ("isCurrentComplianceTripped", "SENSe:CURRent:PROTection:TRIPped?"),
        ("setVoltageRangeAuto", "SOURce{ch}:VOLTage:RANGe:AUTO {state}"),
        ("setVoltageRange", "SOURce{ch}:VOLTage:RANGe {value}"),
        ("queryVoltageRangeAuto", "SOURce{ch}:VOLTage:RANGe:AUTO?"),
        ("queryVoltageRange", "SOURce{ch}:VOLTage:RANGe?"),
        ("setCurrentRangeAuto", "SOURce{ch}:CURRent:RANGe:AUTO {state}"),
        ("setCurrentRange", "SOURce{ch}:CURRent:RANGe {value}"),
        ("queryCurrentRangeAuto", "SOURce{ch}:CURRent:RANGe:AUTO?"),
        ("queryCurrentRange", "SOURce{ch}:CURRent:RANGe?"),
        ("setMeasureVoltageRangeAuto", "SENSe{ch}:VOLTage:RANGe:AUTO {state}"),
        ("setMeasureVoltageRange", "SENSe{ch}:VOLTage:RANGe {value}"),
        ("queryMeasureVoltageRangeAuto", "SENSe{ch}:VOLTage:RANGe:AUTO?"),
        ("queryMeasureVoltageRange", "SENSe{ch}:VOLTage:RANGe?"),
        ("setMeasureCurrentRangeAuto", "SENSe{ch}:CURRent:RANGe:AUTO {state}"),
        ("setMeasureCurrentRange", "SENSe{ch}:CURRent:RANGe {value}"),
        ("queryMeasureCurrentRangeAuto", "SENSe{ch}:CURRent:RANGe:AUTO?"),
        ("queryMeasureCurrentRange", "SENSe{ch}:CURRent:RANGe?"),
    ])
});
