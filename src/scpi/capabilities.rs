//! What an instrument can do.
//!
//! The dispatcher checks the capability of an operation before looking up its
//! command. An absent capability is not an error: commands become silent no-ops and
//! queries return `None`, so code written against a full power supply keeps running
//! on a meter or a current source.

use std::collections::HashSet;

/// Functional area of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Output enable/disable and state.
    Output,
    /// Load input enable/disable and state.
    Input,
    /// Programming a voltage setpoint.
    VoltageSetpoint,
    /// Programming a current setpoint.
    CurrentSetpoint,
    /// Reading setpoints back.
    SetpointReadback,
    /// Measuring voltage.
    VoltageMeasurement,
    /// Measuring current.
    CurrentMeasurement,
    /// Measuring power.
    PowerMeasurement,
    /// Measuring resistance.
    ResistanceMeasurement,
    /// Peak (max/min) measurements.
    ExtremaMeasurement,
    /// Over-voltage protection.
    VoltageProtection,
    /// Over-current protection.
    CurrentProtection,
    /// Source-meter compliance limits.
    Compliance,
    /// Source output ranges.
    SourceRange,
    /// Measurement ranges.
    MeasureRange,
    /// Source function selection.
    SourceFunction,
    /// Audible beeper.
    Beeper,
    /// Front panel local/remote/lock.
    RemoteMode,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Capability; 18] = [
        Capability::Output,
        Capability::Input,
        Capability::VoltageSetpoint,
        Capability::CurrentSetpoint,
        Capability::SetpointReadback,
        Capability::VoltageMeasurement,
        Capability::CurrentMeasurement,
        Capability::PowerMeasurement,
        Capability::ResistanceMeasurement,
        Capability::ExtremaMeasurement,
        Capability::VoltageProtection,
        Capability::CurrentProtection,
        Capability::Compliance,
        Capability::SourceRange,
        Capability::MeasureRange,
        Capability::SourceFunction,
        Capability::Beeper,
        Capability::RemoteMode,
    ];
}

/// Set of supported capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities(HashSet<Capability>);

impl Capabilities {
    /// Everything supported.
    pub fn all() -> Self {
        Self(Capability::ALL.iter().copied().collect())
    }

    /// Only the listed capabilities.
    pub fn only(caps: &[Capability]) -> Self {
        Self(caps.iter().copied().collect())
    }

    /// Remove the listed capabilities.
    pub fn without(mut self, caps: &[Capability]) -> Self {
        for cap in caps {
            self.0.remove(cap);
        }
        self
    }

    /// Membership test.
    pub fn supports(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without() {
        let caps = Capabilities::all().without(&[Capability::VoltageSetpoint]);
        assert!(!caps.supports(Capability::VoltageSetpoint));
        assert!(caps.supports(Capability::CurrentSetpoint));
    }

    #[test]
    fn test_only() {
        let caps = Capabilities::only(&[Capability::VoltageMeasurement]);
        assert!(caps.supports(Capability::VoltageMeasurement));
        assert!(!caps.supports(Capability::Output));
    }
}
