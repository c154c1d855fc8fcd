//! # Agora Core
//!
//! Core types shared by every Agora service: the unified error type, typed
//! identifiers, pagination, domain entities, and the domain events that flow
//! over the messaging backbone.

pub mod domain;
pub mod error;
pub mod id;
pub mod pagination;
pub mod result;
pub mod telemetry;

pub use domain::*;
pub use error::*;
pub use id::*;
pub use pagination::*;
pub use result::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
