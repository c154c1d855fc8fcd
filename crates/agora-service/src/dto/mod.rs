//! Data Transfer Objects (DTOs).

mod media_dto;
mod post_dto;

pub use media_dto::*;
pub use post_dto::*;
