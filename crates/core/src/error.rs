/// Result alias that carries the crate-wide [`EngineError`] type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Common error type for the core crate.
///
/// Every variant describes a rejected call: the engine validates its inputs
/// before touching any state, so an `Err` always means nothing was mutated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A wall-clock time that is NaN, infinite or negative.
    #[error("invalid {what}: {value} (seconds must be finite and non-negative)")]
    InvalidTime { what: &'static str, value: f64 },
    /// A tick quantity that is NaN, infinite or negative.
    #[error("invalid {what}: {value} (ticks must be finite and non-negative)")]
    InvalidTicks { what: &'static str, value: f64 },
    /// An automation value the curve cannot represent.
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: f64 },
    /// Loop bounds where the end does not lie after the start.
    #[error("loop end ({end}) must be greater than loop start ({start})")]
    InvalidLoop { start: u64, end: u64 },
    /// Configuration that parsed but does not describe a usable engine.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Free-form message, mostly surfaced by the command line front end.
    #[error("{0}")]
    Message(String),
    /// Wrapper around configuration decoding errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for EngineError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EngineError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Rejects seconds that are not finite or lie before the origin.
pub(crate) fn check_time(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidTime { what, value })
    }
}

/// Rejects tick quantities that are not finite or are negative.
pub(crate) fn check_ticks(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidTicks { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_and_negative_inputs() {
        assert!(check_time("when", 0.0).is_ok());
        assert!(check_time("when", -0.5).is_err());
        assert!(check_time("when", f64::NAN).is_err());
        assert!(check_ticks("duration", f64::INFINITY).is_err());

        let err = check_ticks("duration", -1.0).unwrap_err();
        assert!(format!("{err}").contains("duration"));
    }
}
