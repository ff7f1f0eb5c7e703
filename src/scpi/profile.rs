//! Static description of an instrument model.

use super::capabilities::{Capabilities, Capability};
use super::table::CommandTable;
use crate::adapters::{Bridge, Framing};
use std::time::Duration;

/// NaN returned by Keithley meters for overflow and unsupported readings.
pub const KEITHLEY_NAN: f64 = 9.91e37;

/// Everything about a driver that is fixed per instrument model.
///
/// Profiles are built once (usually in a `Lazy` static) and shared by reference;
/// nothing mutates them after construction.
#[derive(Debug, Clone)]
pub struct DriverProfile {
    /// Model name used in logs.
    pub model: &'static str,
    /// Number of output channels.
    pub channels: u8,
    /// Prepended to every command not exempted by the prefix rule.
    pub prefix: &'static str,
    /// Terminator appended to writes.
    pub write_termination: &'static str,
    /// Terminator ending replies.
    pub read_termination: Option<&'static str>,
    /// Default settling delay after a command.
    pub wait: Duration,
    /// Read timeout.
    pub timeout: Duration,
    /// Delay between writing a query and reading its reply.
    pub query_delay: Option<Duration>,
    /// Vendor deviations from the SCPI base table.
    pub overrides: CommandTable,
    /// Supported operations.
    pub capabilities: Capabilities,
    /// Legacy "not a number" value.
    pub nan: f64,
    /// GPIB bridge forced regardless of resource string.
    pub bridge: Option<Bridge>,
    /// Default GPIB address behind a bridge.
    pub gpib_address: u8,
    /// `++read_tmo_ms` sent to Prologix adapters.
    pub prologix_read_timeout_ms: u32,
    /// Wait before draining a KISS-488 banner.
    pub banner_settle: Duration,
    /// Environment variable holding the instrument address.
    pub resource_env: &'static str,
    /// Address used when the variable is unset.
    pub default_resource: &'static str,
}

impl DriverProfile {
    /// Plain single-channel SCPI instrument.
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            channels: 1,
            prefix: "",
            write_termination: "\n",
            read_termination: Some("\n"),
            wait: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
            query_delay: None,
            overrides: CommandTable::new(),
            capabilities: Capabilities::all(),
            nan: f64::NAN,
            bridge: None,
            gpib_address: 0,
            prologix_read_timeout_ms: 600,
            banner_settle: Duration::from_millis(1500),
            resource_env: "DCPS_RESOURCE",
            default_resource: "TCPIP0::192.168.1.100::5025::SOCKET",
        }
    }

    /// Set the channel count.
    pub fn channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    /// Set the command prefix.
    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    /// Set write and read terminators.
    pub fn terminations(mut self, write: &'static str, read: Option<&'static str>) -> Self {
        self.write_termination = write;
        self.read_termination = read;
        self
    }

    /// Set the default settling delay.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Set the read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the query delay.
    pub fn query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Set the override table.
    pub fn overrides(mut self, table: CommandTable) -> Self {
        self.overrides = table;
        self
    }

    /// Drop unsupported capabilities.
    pub fn without(mut self, caps: &[Capability]) -> Self {
        self.capabilities = self.capabilities.without(caps);
        self
    }

    /// Set the legacy NaN value.
    pub fn nan(mut self, nan: f64) -> Self {
        self.nan = nan;
        self
    }

    /// Force a GPIB bridge.
    pub fn bridge(mut self, bridge: Bridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// GPIB bridge defaults: address, Prologix read timeout, banner wait.
    pub fn gpib(mut self, address: u8, prologix_read_timeout_ms: u32, banner_settle: Duration) -> Self {
        self.gpib_address = address;
        self.prologix_read_timeout_ms = prologix_read_timeout_ms;
        self.banner_settle = banner_settle;
        self
    }

    /// Address environment variable and its fallback.
    pub fn resource(mut self, env: &'static str, default: &'static str) -> Self {
        self.resource_env = env;
        self.default_resource = default;
        self
    }

    /// Transport framing for this model.
    pub fn framing(&self, timeout: Duration) -> Framing {
        Framing {
            write_termination: self.write_termination.to_string(),
            read_termination: self.read_termination.map(str::to_string),
            timeout,
        }
    }

    /// Present an optional reading the way older scripts expect: a number, or the
    /// model's NaN sentinel.
    pub fn legacy_value(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.nan)
    }

    /// Address from the environment, falling back to the model default.
    pub fn resource_from_env(&self) -> String {
        std::env::var(self.resource_env).unwrap_or_else(|_| self.default_resource.to_string())
    }
}
