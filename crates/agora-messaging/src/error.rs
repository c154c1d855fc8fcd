//! Messaging error types.

use agora_core::AgoraError;
use agora_resilience::TimedOut;
use thiserror::Error;

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Broker-related errors.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// A single connection attempt failed.
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// Every connection attempt failed.
    #[error("Broker unreachable after {attempts} attempts: {last_error}")]
    ConnectExhausted { attempts: u32, last_error: String },

    /// A broker operation did not finish in time.
    #[error("Broker operation timed out: {0}")]
    Timeout(String),

    /// Channel-level failure (declare, bind, publish, ack).
    #[error("Channel error: {0}")]
    Channel(String),

    /// The exchange could not be asserted with the requested settings.
    #[error("Exchange '{exchange}' rejected: {reason}")]
    Exchange { exchange: String, reason: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection or channel is closed.
    #[error("Broker connection is closed")]
    Closed,
}

impl MessagingError {
    /// Returns true if reconnecting may fix this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MessagingError::Connection(_)
                | MessagingError::Timeout(_)
                | MessagingError::Channel(_)
                | MessagingError::Closed
        )
    }
}

impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        MessagingError::Channel(err.to_string())
    }
}

impl From<TimedOut> for MessagingError {
    fn from(err: TimedOut) -> Self {
        MessagingError::Timeout(err.to_string())
    }
}

impl From<MessagingError> for AgoraError {
    fn from(err: MessagingError) -> Self {
        AgoraError::Messaging(err.to_string())
    }
}
