//! # Agora Resilience
//!
//! Resilience patterns for the Agora services.
//! Provides bounded retry and per-operation timeouts.

pub mod retry;
pub mod timeout;

pub use retry::*;
pub use timeout::*;
