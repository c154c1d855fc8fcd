//! # Agora Config
//!
//! Configuration management for the Agora services.
//! Supports layered configuration from files and environment variables,
//! plus runtime refresh.

mod app_config;
mod loader;
mod role;

pub use app_config::*;
pub use loader::*;
pub use role::*;
