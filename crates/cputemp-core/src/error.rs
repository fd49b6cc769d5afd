//! Error types for sensor reads.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, ReadError>;

/// Errors returned by [`SensorCache::read`](crate::SensorCache::read).
///
/// Errors are `Clone` because a single sensor read is shared by every
/// request that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    /// Sensor read failed but the retry budget is not used up yet.
    #[error("failed to read temperature sensor ({failures}/{max_failures}): {message}")]
    Transient {
        message: String,
        failures: u32,
        max_failures: u32,
    },

    /// Retry budget used up and no earlier reading to fall back on.
    #[error("failed to read temperature after {failures} consecutive failures")]
    Exhausted { failures: u32 },

    /// Sensor produced text that is not a plausible temperature.
    #[error("invalid temperature reading {raw:?}: {reason}")]
    InvalidData { raw: String, reason: String },
}
