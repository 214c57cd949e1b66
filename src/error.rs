//! Error types for the matchmaking core
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the crate. Callers that need to react to a specific failure
//! downcast the `anyhow::Error` to [`MatchmakingError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Queue closed: {queue}")]
    QueueClosed { queue: String },

    #[error("Invalid group {group_id}: {reason}")]
    InvalidGroup { group_id: String, reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Shorthand for configuration failures
    pub fn config(message: impl Into<String>) -> Self {
        MatchmakingError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Shorthand for poisoned locks and other internal failures
    pub fn internal(message: impl Into<String>) -> Self {
        MatchmakingError::InternalError {
            message: message.into(),
        }
    }
}

/// Failure of a single matching cycle that was recovered by the matcher.
///
/// Delivered on the matcher's error channel; the next cycle runs normally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CycleError {
    #[error("Assembly pass panicked in {queue} queue (cycle {cycle}): {message}")]
    AssemblyPanicked {
        queue: String,
        cycle: u64,
        message: String,
    },

    #[error("Matching cycle {cycle} failed: {message}")]
    CycleFailed { cycle: u64, message: String },
}

/// Check whether an error is a closed-queue rejection
pub fn is_queue_closed(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::QueueClosed { .. })
    )
}
