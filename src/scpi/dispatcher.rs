//! The SCPI session: channel state, send/query and keyed dispatch.
//!
//! [`Scpi`] owns the connection to one instrument together with its profile. Driver
//! methods go through the keyed helpers ([`Scpi::command`], [`Scpi::fetch_value`], ...)
//! which apply the same order every time:
//!
//! 1. validate and store the channel argument (nothing is sent for a bad channel);
//! 2. skip quietly if the profile lacks the capability;
//! 3. resolve the key through the override table, then the base table;
//!    a disabled entry is skipped as well;
//! 4. send a channel select, only when a channel was passed and the instrument has
//!    more than one;
//! 5. send the command (or query and parse the reply), then settle.

use super::bridge;
use super::capabilities::Capability;
use super::format::{apply_prefix, interpolate, on_off, Args};
use super::parse::{parse_bool, parse_float, InstrumentError};
use super::profile::DriverProfile;
use super::table::{self, Template, SCPI_BASE};
use crate::adapters::{self, Bridge, ResourceAddress, Transport};
use crate::error::{DcpsError, DcpsResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum `*OPC?` polls in [`Scpi::wait_complete`].
const MAX_OPC_POLLS: usize = 100;
/// Maximum entries drained from the error queue.
const MAX_ERROR_ENTRIES: usize = 64;

/// Result of a range query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSetting {
    /// Automatic ranging; no upper bound.
    Auto,
    /// Fixed range with the given upper bound.
    Upper(f64),
}

impl RangeSetting {
    /// Upper bound, absent for automatic ranging.
    pub fn upper(&self) -> Option<f64> {
        match self {
            RangeSetting::Auto => None,
            RangeSetting::Upper(v) => Some(*v),
        }
    }
}

/// Session with one instrument.
pub struct Scpi {
    profile: Arc<DriverProfile>,
    resource: String,
    channels: u8,
    channel: u8,
    wait: Duration,
    timeout: Duration,
    query_delay: Option<Duration>,
    gpib_address: u8,
    bridge: Bridge,
    transport: Option<Box<dyn Transport>>,
}

impl Scpi {
    /// New, unopened session for `resource`.
    pub fn new(profile: Arc<DriverProfile>, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let bridge = profile.bridge.unwrap_or_else(|| {
            ResourceAddress::parse(&resource)
                .map(|addr| addr.bridge())
                .unwrap_or(Bridge::None)
        });
        Self {
            channels: profile.channels,
            channel: 1,
            wait: profile.wait,
            timeout: profile.timeout,
            query_delay: profile.query_delay,
            gpib_address: profile.gpib_address,
            bridge,
            transport: None,
            resource,
            profile,
        }
    }

    /// Override the channel count (models sold in several channel variants).
    ///
    /// # Errors
    ///
    /// [`DcpsError::InvalidArgument`] for zero channels.
    pub fn with_channels(mut self, channels: u8) -> DcpsResult<Self> {
        if channels == 0 {
            return Err(DcpsError::invalid_argument(
                "with_channels",
                "an instrument has at least one channel",
            ));
        }
        self.channels = channels;
        Ok(self)
    }

    /// Override the default settling delay.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Override the read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the query delay.
    pub fn with_query_delay(mut self, delay: Option<Duration>) -> Self {
        self.query_delay = delay;
        self
    }

    /// Override the GPIB address used behind a bridge.
    pub fn with_gpib_address(mut self, address: u8) -> Self {
        self.gpib_address = address;
        self
    }

    /// Override bridge detection.
    pub fn with_bridge(mut self, bridge: Bridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Model profile.
    pub fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    /// Resource string.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Bridge in front of the instrument.
    pub fn bridge(&self) -> Bridge {
        self.bridge
    }

    /// Channel count.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Default settling delay.
    pub fn default_wait(&self) -> Duration {
        self.wait
    }

    /// Default query delay.
    pub fn query_delay(&self) -> Option<Duration> {
        self.query_delay
    }

    /// True between `open()`/`attach()` and `close()`.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Connect to the resource and run the bridge handshake.
    pub fn open(&mut self) -> DcpsResult<()> {
        let address = ResourceAddress::parse(&self.resource)?;
        let transport = adapters::connect(&address, self.profile.framing(self.timeout))?;
        debug!("{}: opened {}", self.profile.model, transport.describe());
        self.attach(transport)
    }

    /// Use an already opened transport and run the bridge handshake.
    pub fn attach(&mut self, transport: Box<dyn Transport>) -> DcpsResult<()> {
        self.transport = Some(transport);
        let settle = self.profile.banner_settle;
        let gpib = self.gpib_address;
        let read_tmo = self.profile.prologix_read_timeout_ms;
        let version_delay = self.query_delay.unwrap_or_default();
        match self.bridge {
            Bridge::None => {}
            Bridge::Kiss488 => {
                bridge::drain_banner(self.transport_mut()?.as_mut(), settle)?;
            }
            Bridge::Prologix => {
                bridge::configure_prologix(self.transport_mut()?.as_mut(), gpib, read_tmo, version_delay)?;
            }
        }
        Ok(())
    }

    /// Release the connection. Closing twice is harmless.
    pub fn close(&mut self) -> DcpsResult<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.close()?;
            debug!("{}: closed", self.profile.model);
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> DcpsResult<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or(DcpsError::NotConnected)
    }

    // ------------------------------------------------------------------
    // Channel state
    // ------------------------------------------------------------------

    /// Current channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Make `channel` current; multi-channel instruments also get a select command.
    ///
    /// # Errors
    ///
    /// [`DcpsError::InvalidChannel`] outside `1..=channels`, with nothing sent.
    pub fn set_channel(&mut self, channel: u8) -> DcpsResult<()> {
        self.use_channel(Some(channel))?;
        self.select_channel()
    }

    /// Validate and store an optional channel argument. Returns whether one was given.
    pub fn use_channel(&mut self, channel: Option<u8>) -> DcpsResult<bool> {
        match channel {
            None => Ok(false),
            Some(ch) if ch >= 1 && ch <= self.channels => {
                self.channel = ch;
                Ok(true)
            }
            Some(ch) => Err(DcpsError::InvalidChannel {
                channel: ch,
                max: self.channels,
            }),
        }
    }

    /// Send the channel select for the current channel (multi-channel only).
    pub fn select_channel(&mut self) -> DcpsResult<()> {
        if self.channels > 1 {
            if let Some(template) = self.resolve("chanSelect")? {
                self.send(template, &Args::new())?;
            }
        }
        Ok(())
    }

    /// Always send the channel select, even on a single-channel instrument.
    pub fn force_select_channel(&mut self) -> DcpsResult<()> {
        if let Some(template) = self.resolve("chanSelect")? {
            self.send(template, &Args::new())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tables and capabilities
    // ------------------------------------------------------------------

    /// Resolve an operation key for this model.
    pub fn resolve(&self, key: &str) -> DcpsResult<Option<Template>> {
        table::resolve(&SCPI_BASE, Some(&self.profile.overrides), key)
    }

    /// Resolve a key that may legitimately be missing from both tables.
    pub fn lookup(&self, key: &str) -> Option<Option<Template>> {
        table::lookup(&SCPI_BASE, Some(&self.profile.overrides), key)
    }

    /// Capability test.
    pub fn supports(&self, cap: Capability) -> bool {
        self.profile.capabilities.supports(cap)
    }

    // ------------------------------------------------------------------
    // Wire primitives
    // ------------------------------------------------------------------

    /// Interpolate `template` (with `{ch}` defaulting to the current channel) and apply
    /// the prefix rule.
    pub fn render(&self, template: &str, args: &Args) -> DcpsResult<String> {
        let mut args = args.clone();
        args.set_default("ch", self.channel);
        let command = interpolate(template, &args)?;
        Ok(apply_prefix(self.profile.prefix, &command))
    }

    /// Write one command. No settling delay.
    pub fn send(&mut self, template: &str, args: &Args) -> DcpsResult<()> {
        let command = self.render(template, args)?;
        self.write_raw(&command)
    }

    /// Write a command that must not be interpolated (free text), applying only the
    /// prefix rule.
    pub fn send_literal(&mut self, command: &str) -> DcpsResult<()> {
        let command = apply_prefix(self.profile.prefix, command);
        self.write_raw(&command)
    }

    /// Front panel local (`true`) or lockout through a Prologix bridge. Other
    /// connections have no equivalent and send nothing.
    pub fn bridge_front_panel(&mut self, local: bool) -> DcpsResult<()> {
        if self.bridge != Bridge::Prologix {
            debug!("{}: front panel control needs a Prologix bridge, skipped", self.profile.model);
            return Ok(());
        }
        self.write_raw(if local { "++loc" } else { "++llo" })
    }

    /// Write a line exactly as given.
    pub fn write_raw(&mut self, line: &str) -> DcpsResult<()> {
        debug!("WRITE: {}", line.escape_debug());
        self.transport_mut()?.write_line(line)
    }

    /// Write a query, wait `delay` (or the session query delay) and return the trimmed
    /// reply.
    pub fn query(&mut self, template: &str, args: &Args, delay: Option<Duration>) -> DcpsResult<String> {
        let command = self.render(template, args)?;
        let framed = bridge::frame_query(self.bridge, self.profile.write_termination, &command);
        debug!("QUERY: {}", framed.escape_debug());
        let delay = delay.or(self.query_delay);
        let transport = self.transport_mut()?;
        transport.write_line(&framed)?;
        if let Some(delay) = delay {
            transport.settle(delay);
        }
        let reply = transport.read_line()?.trim().to_string();
        debug!("REPLY: {}", reply.escape_debug());
        Ok(reply)
    }

    /// Write a query and read exactly `count` raw bytes.
    pub fn query_bytes(&mut self, template: &str, args: &Args, count: usize) -> DcpsResult<Vec<u8>> {
        let command = self.render(template, args)?;
        debug!("QUERY: {}", command.escape_debug());
        let transport = self.transport_mut()?;
        transport.write_line(&command)?;
        transport.read_bytes(count)
    }

    /// Query and parse a number.
    pub fn query_value(&mut self, template: &str, args: &Args) -> DcpsResult<f64> {
        let reply = self.query(template, args, None)?;
        parse_float(template, &reply)
    }

    /// Query and parse a permissive boolean.
    pub fn query_bool(&mut self, template: &str, args: &Args) -> DcpsResult<bool> {
        let reply = self.query(template, args, None)?;
        Ok(parse_bool(&reply))
    }

    /// Drop any stale reply bytes held by the transport.
    pub fn clear_input(&mut self) -> DcpsResult<()> {
        self.transport_mut()?.clear_input()
    }

    /// Sleep for `wait`, or the default settling delay.
    pub fn settle(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        let wait = wait.unwrap_or(self.wait);
        self.transport_mut()?.settle(wait);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Keyed dispatch
    // ------------------------------------------------------------------

    /// Run a keyed command: channel, capability, lookup, select, send, settle.
    pub fn command(
        &mut self,
        cap: Capability,
        key: &str,
        args: &Args,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        if let Some(template) = self.prepare(cap, key, channel)? {
            self.send(template, args)?;
            self.settle(wait)?;
        }
        Ok(())
    }

    /// Run `all_key` if the model has a single all-channel command, otherwise run `key`
    /// on every channel in turn. Settles once at the end.
    pub fn command_all(
        &mut self,
        cap: Capability,
        all_key: &str,
        key: &str,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        if !self.supports(cap) {
            return Ok(());
        }
        if let Some(Some(template)) = self.lookup(all_key) {
            self.send(template, &Args::new())?;
            return self.settle(wait);
        }
        let Some(template) = self.resolve(key)? else {
            return Ok(());
        };
        for ch in 1..=self.channels {
            self.use_channel(Some(ch))?;
            self.select_channel()?;
            self.send(template, &Args::new())?;
        }
        self.settle(wait)
    }

    /// Keyed query returning the raw reply, `None` when unsupported.
    pub fn fetch_string(
        &mut self,
        cap: Capability,
        key: &str,
        args: &Args,
        channel: Option<u8>,
    ) -> DcpsResult<Option<String>> {
        match self.prepare(cap, key, channel)? {
            Some(template) => self.query(template, args, None).map(Some),
            None => Ok(None),
        }
    }

    /// Keyed numeric query.
    pub fn fetch_value(
        &mut self,
        cap: Capability,
        key: &str,
        args: &Args,
        channel: Option<u8>,
    ) -> DcpsResult<Option<f64>> {
        match self.prepare(cap, key, channel)? {
            Some(template) => {
                let reply = self.query(template, args, None)?;
                parse_float(template, &reply).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Keyed boolean query.
    pub fn fetch_bool(
        &mut self,
        cap: Capability,
        key: &str,
        args: &Args,
        channel: Option<u8>,
    ) -> DcpsResult<Option<bool>> {
        Ok(self
            .fetch_string(cap, key, args, channel)?
            .map(|reply| parse_bool(&reply)))
    }

    fn prepare(&mut self, cap: Capability, key: &str, channel: Option<u8>) -> DcpsResult<Option<Template>> {
        let explicit = self.use_channel(channel)?;
        if !self.supports(cap) {
            debug!("{}: '{}' not supported, skipped", self.profile.model, key);
            return Ok(None);
        }
        let Some(template) = self.resolve(key)? else {
            debug!("{}: '{}' has no equivalent, skipped", self.profile.model, key);
            return Ok(None);
        };
        if explicit {
            self.select_channel()?;
        }
        Ok(Some(template))
    }

    // ------------------------------------------------------------------
    // Generic range / protection helpers
    // ------------------------------------------------------------------

    /// `None` selects automatic ranging (if `auto` exists, else nothing); a value
    /// disables auto ranging (if `auto` exists) and programs the bounded range.
    pub fn set_generic_range(
        &mut self,
        upper: Option<f64>,
        auto: Option<&str>,
        range: Option<&str>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        let commands: Vec<(&str, Args)> = match upper {
            None => auto
                .map(|auto| (auto, Args::new().with("state", on_off(true))))
                .into_iter()
                .collect(),
            Some(value) => auto
                .map(|auto| (auto, Args::new().with("state", on_off(false))))
                .into_iter()
                .chain(range.map(|range| (range, Args::value(value))))
                .collect(),
        };
        let explicit = self.use_channel(channel)?;
        if commands.is_empty() {
            return Ok(());
        }
        if explicit {
            self.select_channel()?;
        }
        for (template, args) in &commands {
            self.send(template, args)?;
        }
        self.settle(wait)
    }

    /// Query automatic ranging first (if `auto` exists); report the bounded range
    /// otherwise. `None` when the model has no range query at all.
    pub fn query_generic_range(
        &mut self,
        auto: Option<&str>,
        range: Option<&str>,
        channel: Option<u8>,
    ) -> DcpsResult<Option<RangeSetting>> {
        if self.use_channel(channel)? {
            self.select_channel()?;
        }
        if let Some(auto) = auto {
            if self.query_bool(auto, &Args::new())? {
                return Ok(Some(RangeSetting::Auto));
            }
        }
        match range {
            Some(range) => Ok(Some(RangeSetting::Upper(self.query_value(range, &Args::new())?))),
            None => Ok(None),
        }
    }

    /// Program a trip level and, if given, a trip delay as two separate commands.
    #[allow(clippy::too_many_arguments)]
    pub fn set_generic_protection(
        &mut self,
        level_cmd: &str,
        delay_cmd: Option<&str>,
        level: f64,
        delay: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        if self.use_channel(channel)? {
            self.select_channel()?;
        }
        self.send(level_cmd, &Args::value(level))?;
        if let (Some(delay_cmd), Some(delay)) = (delay_cmd, delay) {
            self.send(delay_cmd, &Args::new().with_number("delay", delay))?;
        }
        self.settle(wait)
    }

    /// Keyed form of [`Scpi::set_generic_range`].
    pub fn set_range(
        &mut self,
        cap: Capability,
        auto_key: &str,
        range_key: &str,
        upper: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.use_channel(channel)?;
        if !self.supports(cap) {
            return Ok(());
        }
        let auto = self.resolve(auto_key)?;
        let range = self.resolve(range_key)?;
        self.set_generic_range(upper, auto, range, channel, wait)
    }

    /// Keyed form of [`Scpi::query_generic_range`].
    pub fn query_range(
        &mut self,
        cap: Capability,
        auto_key: &str,
        range_key: &str,
        channel: Option<u8>,
    ) -> DcpsResult<Option<RangeSetting>> {
        self.use_channel(channel)?;
        if !self.supports(cap) {
            return Ok(None);
        }
        let auto = self.resolve(auto_key)?;
        let range = self.resolve(range_key)?;
        self.query_generic_range(auto, range, channel)
    }

    /// Keyed form of [`Scpi::set_generic_protection`].
    #[allow(clippy::too_many_arguments)]
    pub fn set_protection(
        &mut self,
        cap: Capability,
        level_key: &str,
        delay_key: &str,
        level: f64,
        delay: Option<f64>,
        channel: Option<u8>,
        wait: Option<Duration>,
    ) -> DcpsResult<()> {
        self.use_channel(channel)?;
        if !self.supports(cap) {
            return Ok(());
        }
        let Some(level_cmd) = self.resolve(level_key)? else {
            return Ok(());
        };
        let delay_cmd = self.resolve(delay_key)?;
        self.set_generic_protection(level_cmd, delay_cmd, level, delay, channel, wait)
    }

    // ------------------------------------------------------------------
    // Common commands
    // ------------------------------------------------------------------

    /// `*IDN?`
    pub fn idn(&mut self) -> DcpsResult<String> {
        match self.resolve("idn")? {
            Some(template) => self.query(template, &Args::new(), None),
            None => Ok(String::new()),
        }
    }

    /// `*RST` followed by the settling delay.
    pub fn rst(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        if let Some(template) = self.resolve("rst")? {
            self.send(template, &Args::new())?;
            self.settle(wait)?;
        }
        Ok(())
    }

    /// `*CLS` followed by the settling delay.
    pub fn cls(&mut self, wait: Option<Duration>) -> DcpsResult<()> {
        if let Some(template) = self.resolve("cls")? {
            self.send(template, &Args::new())?;
            self.settle(wait)?;
        }
        Ok(())
    }

    /// `*OPC`, then poll `*OPC?` until the instrument reports completion.
    ///
    /// # Errors
    ///
    /// [`DcpsError::Timeout`] if completion is not reported within the poll budget.
    pub fn wait_complete(&mut self) -> DcpsResult<()> {
        let (Some(opc), Some(opc_query)) = (self.resolve("opc")?, self.resolve("opcQuery")?) else {
            return Ok(());
        };
        self.send(opc, &Args::new())?;
        for _ in 0..MAX_OPC_POLLS {
            let reply = self.query(opc_query, &Args::new(), None)?;
            if reply.starts_with('1') {
                return Ok(());
            }
        }
        Err(DcpsError::Timeout)
    }

    /// Drain the instrument error queue.
    pub fn read_errors(&mut self) -> DcpsResult<Vec<InstrumentError>> {
        let Some(template) = self.resolve("errorQuery")? else {
            return Ok(Vec::new());
        };
        let mut errors = Vec::new();
        for _ in 0..MAX_ERROR_ENTRIES {
            let reply = self.query(template, &Args::new(), None)?;
            let entry = InstrumentError::parse(&reply)?;
            if entry.is_empty() {
                break;
            }
            errors.push(entry);
        }
        Ok(errors)
    }

    /// Drain the error queue and log every entry as a warning.
    pub fn log_all_errors(&mut self) -> DcpsResult<usize> {
        let errors = self.read_errors()?;
        for entry in &errors {
            warn!("{}: instrument error {}", self.profile.model, entry);
        }
        Ok(errors.len())
    }
}

impl std::fmt::Debug for Scpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scpi")
            .field("model", &self.profile.model)
            .field("resource", &self.resource)
            .field("channel", &self.channel)
            .field("channels", &self.channels)
            .field("bridge", &self.bridge)
            .field("open", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockTransport, WireEvent};
    use crate::scpi::table::CommandTable;

    fn session(profile: DriverProfile) -> (Scpi, MockTransport) {
        let mock = MockTransport::new();
        let mut scpi = Scpi::new(Arc::new(profile), "TCPIP0::127.0.0.1::5025::SOCKET");
        scpi.attach(Box::new(mock.clone())).unwrap();
        (scpi, mock)
    }

    #[test]
    fn test_invalid_channel_sends_nothing() {
        let (mut scpi, mock) = session(DriverProfile::new("x").channels(3));
        for bad in [0u8, 4, 200] {
            let err = scpi.set_channel(bad).unwrap_err();
            assert!(matches!(err, DcpsError::InvalidChannel { .. }));
        }
        let err = scpi
            .command(Capability::Output, "outputOn", &Args::new(), Some(9), None)
            .unwrap_err();
        assert!(matches!(err, DcpsError::InvalidChannel { channel: 9, max: 3 }));
        assert!(mock.events().is_empty());
        assert_eq!(scpi.channel(), 1);
    }

    #[test]
    fn test_single_channel_never_selects() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        scpi.command(Capability::Output, "outputOn", &Args::new(), Some(1), None)
            .unwrap();
        assert_eq!(mock.writes(), vec!["OUTPut:STATe ON"]);
    }

    #[test]
    fn test_capability_absent_is_silent() {
        let profile = DriverProfile::new("x").without(&[Capability::VoltageSetpoint]);
        let (mut scpi, mock) = session(profile);
        scpi.command(Capability::VoltageSetpoint, "setVoltage", &Args::value(1.0), None, None)
            .unwrap();
        let value = scpi
            .fetch_value(Capability::VoltageSetpoint, "queryVoltage", &Args::new(), None)
            .unwrap();
        assert_eq!(value, None);
        assert!(mock.events().is_empty());
    }

    #[test]
    fn test_disabled_entry_is_silent() {
        let profile = DriverProfile::new("x").overrides(CommandTable::new().disabled(&["beeperOn"]));
        let (mut scpi, mock) = session(profile);
        scpi.command(Capability::Beeper, "beeperOn", &Args::new(), None, None)
            .unwrap();
        assert!(mock.events().is_empty());
    }

    #[test]
    fn test_prefix_and_query_delay() {
        let profile = DriverProfile::new("x")
            .prefix(":")
            .query_delay(Duration::from_millis(10));
        let (mut scpi, mock) = session(profile);
        mock.push_reply(" 12.5 \n");
        let v = scpi
            .fetch_value(Capability::VoltageMeasurement, "measureVoltage", &Args::new(), None)
            .unwrap();
        assert_eq!(v, Some(12.5));
        assert_eq!(
            mock.events(),
            vec![
                WireEvent::Write(":MEASure:VOLTage:DC?".into()),
                WireEvent::Settle(Duration::from_millis(10)),
                WireEvent::Read(" 12.5 \n".into()),
            ]
        );
    }

    #[test]
    fn test_parse_error_propagates() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        mock.push_reply("OVERLOAD");
        let err = scpi
            .fetch_value(Capability::CurrentMeasurement, "measureCurrent", &Args::new(), None)
            .unwrap_err();
        assert!(matches!(err, DcpsError::Parse { .. }));
    }

    #[test]
    fn test_generic_range_auto_and_bounded() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        let auto = Some("SENSe{ch}:VOLTage:RANGe:AUTO {state}");
        let range = Some("SENSe{ch}:VOLTage:RANGe {value}");

        scpi.set_generic_range(None, auto, range, None, None).unwrap();
        assert_eq!(mock.writes(), vec!["SENSe1:VOLTage:RANGe:AUTO ON"]);

        mock.clear_events();
        scpi.set_generic_range(Some(0.125), auto, range, None, None).unwrap();
        assert_eq!(
            mock.writes(),
            vec!["SENSe1:VOLTage:RANGe:AUTO OFF", "SENSe1:VOLTage:RANGe 0.125"]
        );

        mock.clear_events();
        scpi.set_generic_range(None, None, range, None, None).unwrap();
        scpi.set_generic_range(Some(1.0), None, None, None, None).unwrap();
        assert!(mock.events().is_empty());
        assert!(scpi.set_generic_range(None, None, None, Some(2), None).is_err());
    }

    #[test]
    fn test_generic_range_query() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        mock.push_reply("1");
        let auto = Some("SENS:RANG:AUTO?");
        let range = Some("SENS:RANG?");
        assert_eq!(
            scpi.query_generic_range(auto, range, None).unwrap(),
            Some(RangeSetting::Auto)
        );
        mock.push_reply("0");
        mock.push_reply("1.000E+01");
        let setting = scpi.query_generic_range(auto, range, None).unwrap().unwrap();
        assert_eq!(setting.upper(), Some(10.0));
        assert_eq!(mock.writes(), vec!["SENS:RANG:AUTO?", "SENS:RANG:AUTO?", "SENS:RANG?"]);
    }

    #[test]
    fn test_generic_protection_optional_delay() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        scpi.set_protection(
            Capability::VoltageProtection,
            "setVoltageProtection",
            "setVoltageProtectionDelay",
            12.5,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(mock.writes(), vec!["SOURce:VOLTage:PROTection:LEVel 12.5"]);

        mock.clear_events();
        scpi.set_protection(
            Capability::VoltageProtection,
            "setVoltageProtection",
            "setVoltageProtectionDelay",
            12.5,
            Some(0.05),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            mock.writes(),
            vec![
                "SOURce:VOLTage:PROTection:LEVel 12.5",
                "SOURce:VOLTage:PROTection:DELay 0.05"
            ]
        );
    }

    #[test]
    fn test_read_errors_drains_queue() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        let mock = mock.with_replies(["-113,\"Undefined header\"", "-222,\"Data out of range\"", "+0,\"No error\""]);
        let errors = scpi.read_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].code, -222);
        assert_eq!(mock.writes().len(), 3);
    }

    #[test]
    fn test_wait_complete_polls() {
        let (mut scpi, mock) = session(DriverProfile::new("x"));
        mock.push_reply("0");
        mock.push_reply("1");
        scpi.wait_complete().unwrap();
        assert_eq!(mock.writes(), vec!["*OPC", "*OPC?", "*OPC?"]);
    }

    #[test]
    fn test_kiss488_attach_drains_and_frames() {
        let mock = MockTransport::new().with_reply("KISS-488 Ethernet");
        let mut scpi = Scpi::new(
            Arc::new(DriverProfile::new("x").gpib(24, 800, Duration::from_millis(1500))),
            "TCPIP0::10.0.0.2::23::SOCKET",
        );
        assert_eq!(scpi.bridge(), Bridge::Kiss488);
        scpi.attach(Box::new(mock.clone())).unwrap();
        mock.push_reply("ACME");
        assert_eq!(scpi.idn().unwrap(), "ACME");
        assert_eq!(mock.writes(), vec!["*IDN?\r"]);
    }

    #[test]
    fn test_not_connected() {
        let mut scpi = Scpi::new(Arc::new(DriverProfile::new("x")), "USB0::INSTR");
        assert!(matches!(scpi.idn().unwrap_err(), DcpsError::NotConnected));
        scpi.close().unwrap();
    }

    #[test]
    fn test_with_channels_rejects_zero() {
        let scpi = Scpi::new(Arc::new(DriverProfile::new("x")), "USB0::INSTR");
        assert!(scpi.with_channels(0).is_err());
    }
}
