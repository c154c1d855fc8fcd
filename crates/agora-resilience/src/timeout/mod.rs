//! Timeout wrapper for async operations.

use agora_core::AgoraError;
use std::fmt;
use std::time::Duration;

/// An operation did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    /// The deadline that elapsed.
    pub after: Duration,
}

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation timed out after {:?}", self.after)
    }
}

impl std::error::Error for TimedOut {}

impl From<TimedOut> for AgoraError {
    fn from(err: TimedOut) -> Self {
        AgoraError::Timeout(err.to_string())
    }
}

/// Wraps an async operation with a timeout.
///
/// The operation's own error type is kept; an elapsed deadline is converted
/// into it through `From<TimedOut>`.
pub async fn with_timeout<F, Fut, T, E>(duration: Duration, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: From<TimedOut>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| E::from(TimedOut { after: duration }))?
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for a single cache round trip.
    pub cache_timeout: Duration,
    /// Timeout for a bulk pattern delete, which may take many round trips.
    pub invalidation_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            cache_timeout: Duration::from_secs(2),
            invalidation_timeout: Duration::from_secs(30),
        }
    }
}
