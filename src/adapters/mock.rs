//! Mock transport for tests and offline development.
//!
//! Records every write, settle and read on a shared log so a test can keep a handle
//! after moving the transport into a driver. Replies are served from a script first;
//! with echo enabled, unscripted queries answer with the value of the last setting
//! written, which makes set-then-query round trips testable without hardware.

use super::Transport;
use crate::error::{DcpsError, DcpsResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One observable interaction with the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// Line written (without terminator).
    Write(String),
    /// Line returned to the caller.
    Read(String),
    /// Raw bytes returned to the caller.
    ReadBytes(Vec<u8>),
    /// Settling delay requested.
    Settle(Duration),
    /// Read timeout changed.
    Timeout(Duration),
    /// Host-side input buffer cleared.
    ClearInput,
    /// Connection closed.
    Close,
}

enum Reply {
    Line(String),
    Bytes(Vec<u8>),
    Timeout,
}

type EchoFn = Box<dyn Fn(&str, &str) -> String + Send>;

#[derive(Default)]
struct MockState {
    events: Vec<WireEvent>,
    replies: VecDeque<Reply>,
    echo: Option<EchoFn>,
    last_setting: Option<(String, String)>,
}

/// Scriptable in-memory [`Transport`]. Clones share the same log and script.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Empty script, no echo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply line.
    pub fn with_reply(self, line: impl Into<String>) -> Self {
        self.push_reply(line);
        self
    }

    /// Queue several reply lines.
    pub fn with_replies<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.push_reply(line);
        }
        self
    }

    /// Answer unscripted reads with the numeric argument of the last setting written.
    pub fn echo_last_value(self) -> Self {
        self.echo_with(|_command, value| value.to_string())
    }

    /// Answer unscripted reads with `reply(command, value)` built from the last
    /// setting written, for instruments that decorate their replies.
    pub fn echo_with<F>(self, reply: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + 'static,
    {
        self.state().echo = Some(Box::new(reply));
        self
    }

    /// Queue a reply line on a shared handle.
    pub fn push_reply(&self, line: impl Into<String>) {
        self.state().replies.push_back(Reply::Line(line.into()));
    }

    /// Queue a raw byte reply.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state().replies.push_back(Reply::Bytes(bytes.to_vec()));
    }

    /// Queue a read timeout.
    pub fn push_timeout(&self) {
        self.state().replies.push_back(Reply::Timeout);
    }

    /// Everything observed so far.
    pub fn events(&self) -> Vec<WireEvent> {
        self.state().events.clone()
    }

    /// Written lines only.
    pub fn writes(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                WireEvent::Write(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Settling delays only.
    pub fn settles(&self) -> Vec<Duration> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                WireEvent::Settle(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Forget the recorded events (the script is kept).
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Replies still queued.
    pub fn pending_replies(&self) -> usize {
        self.state().replies.len()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Split a setting command into its verb and trailing numeric argument.
fn setting_value(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.ends_with('?') || line.starts_with("++") {
        return None;
    }
    let (verb, value) = line.rsplit_once(|c: char| c.is_whitespace() || c == ':' || c == ',')?;
    value
        .parse::<f64>()
        .ok()
        .map(|_| (verb.to_string(), value.to_string()))
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &str) -> DcpsResult<()> {
        let mut state = self.state();
        state.events.push(WireEvent::Write(line.to_string()));
        if let Some(setting) = line.lines().last().and_then(setting_value) {
            state.last_setting = Some(setting);
        }
        Ok(())
    }

    fn read_line(&mut self) -> DcpsResult<String> {
        let mut state = self.state();
        let line = match state.replies.pop_front() {
            Some(Reply::Line(line)) => line,
            Some(Reply::Bytes(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Reply::Timeout) => return Err(DcpsError::Timeout),
            None => match (&state.echo, &state.last_setting) {
                (Some(echo), Some((verb, value))) => echo(verb, value),
                _ => return Err(DcpsError::Timeout),
            },
        };
        state.events.push(WireEvent::Read(line.clone()));
        Ok(line)
    }

    fn read_bytes(&mut self, count: usize) -> DcpsResult<Vec<u8>> {
        let mut state = self.state();
        let mut bytes = match state.replies.pop_front() {
            Some(Reply::Bytes(bytes)) => bytes,
            Some(Reply::Line(line)) => line.into_bytes(),
            Some(Reply::Timeout) | None => return Err(DcpsError::Timeout),
        };
        if bytes.len() < count {
            return Err(DcpsError::Timeout);
        }
        bytes.truncate(count);
        state.events.push(WireEvent::ReadBytes(bytes.clone()));
        Ok(bytes)
    }

    fn set_timeout(&mut self, timeout: Duration) -> DcpsResult<()> {
        self.state().events.push(WireEvent::Timeout(timeout));
        Ok(())
    }

    fn settle(&mut self, duration: Duration) {
        self.state().events.push(WireEvent::Settle(duration));
    }

    fn clear_input(&mut self) -> DcpsResult<()> {
        self.state().events.push(WireEvent::ClearInput);
        Ok(())
    }

    fn close(&mut self) -> DcpsResult<()> {
        self.state().events.push(WireEvent::Close);
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
