//! Template interpolation and the command prefix rule.

use crate::error::{DcpsError, DcpsResult};
use std::collections::HashMap;
use std::fmt::Display;

/// Named arguments for a command template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(HashMap<String, String>);

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// `{value}` set to a number in round-trip form.
    pub fn value(value: f64) -> Self {
        Self::new().with_number("value", value)
    }

    /// Add a preformatted argument.
    pub fn with(mut self, name: &str, value: impl Display) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    /// Add a numeric argument in round-trip form.
    pub fn with_number(self, name: &str, value: f64) -> Self {
        self.with(name, number(value))
    }

    /// Set `name` unless the caller already did.
    pub(crate) fn set_default(&mut self, name: &str, value: impl Display) {
        self.0
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
}

/// Shortest decimal text that parses back to exactly `value` (`5.0`, `-0.125`, `1e-7`).
pub fn number(value: f64) -> String {
    format!("{:?}", value)
}

/// `ON` or `OFF`.
pub fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

/// Fill the named slots of `template`.
///
/// # Errors
///
/// [`DcpsError::Template`] when the template names a slot `args` does not provide.
pub fn interpolate(template: &str, args: &Args) -> DcpsResult<String> {
    if !template.contains('{') {
        return Ok(template.to_string());
    }
    strfmt::strfmt(template, &args.0).map_err(|e| DcpsError::Template {
        template: template.to_string(),
        reason: e.to_string(),
    })
}

/// Apply the prefix rule: `-cmd` strips the prefix, `*cmd` and `++cmd` never get it.
pub fn apply_prefix(prefix: &str, command: &str) -> String {
    if let Some(bare) = command.strip_prefix('-') {
        bare.to_string()
    } else if command.starts_with('*') || command.starts_with("++") {
        command.to_string()
    } else {
        format!("{}{}", prefix, command)
    }
}
