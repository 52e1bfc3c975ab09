use serde::{Deserialize, Serialize};

use crate::timeline::Timed;

/// A single scheduled change of an automatable value.
///
/// Ramps describe the value reached *at* `time`; the ramp itself starts at
/// the previous event. `Cancel` never lands on a timeline: applying it
/// truncates the schedule from `time` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationEvent {
    SetValue {
        time: f64,
        value: f64,
    },
    LinearRamp {
        time: f64,
        value: f64,
    },
    ExponentialRamp {
        time: f64,
        value: f64,
    },
    SetTarget {
        time: f64,
        value: f64,
        time_constant: f64,
    },
    Cancel {
        time: f64,
    },
}

impl AutomationEvent {
    /// The value this event sets, ramps to or approaches.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Self::SetValue { value, .. }
            | Self::LinearRamp { value, .. }
            | Self::ExponentialRamp { value, .. }
            | Self::SetTarget { value, .. } => Some(value),
            Self::Cancel { .. } => None,
        }
    }
}

impl Timed for AutomationEvent {
    fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. }
            | Self::LinearRamp { time, .. }
            | Self::ExponentialRamp { time, .. }
            | Self::SetTarget { time, .. }
            | Self::Cancel { time } => time,
        }
    }
}
