//! Domain entities and the events published about them.

mod events;
mod media;
mod post;
mod search;

pub use events::*;
pub use media::*;
pub use post::*;
pub use search::*;
