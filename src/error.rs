//! Error types shared by the registry, logs, and assistant.

use thiserror::Error;

/// Errors raised by EcoWatch operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The referenced zone or alert does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record that was looked up ("zone", "alert").
        entity: &'static str,
        /// The id that failed to resolve.
        id: i64,
    },

    /// Featuring another zone would exceed the featured capacity.
    #[error("featured zone limit of {capacity} reached")]
    CapacityExceeded {
        /// The configured capacity.
        capacity: i64,
    },

    /// The answer-generation backend was unreachable, timed out, or replied badly.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Caller input was malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying record store failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for EcoWatch operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = MonitorError::NotFound {
            entity: "zone",
            id: 42,
        };
        assert_eq!(err.to_string(), "zone 42 not found");
    }

    #[test]
    fn test_capacity_display() {
        let err = MonitorError::CapacityExceeded { capacity: 5 };
        assert!(err.to_string().contains("limit of 5"));
    }
}
