//! # Agora Server Library
//!
//! Assembles one service process: broker connection, cache, the services for
//! the configured role, and their subscriptions.

pub mod app;
pub mod startup;

pub use app::{App, AppBuilder};
