//! Which service a process runs as.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service role of a running process.
///
/// Each role is an independently deployed service; `All` runs every role in
/// one process for local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Posts write/read path; publishes post events.
    Posts,
    /// Search projection; consumes `post.created` and `post.deleted`.
    Search,
    /// Media store; consumes `post.deleted`.
    Media,
    /// Every role in a single process.
    #[default]
    All,
}

impl ServiceRole {
    /// Returns true if this process runs the posts service.
    #[must_use]
    pub const fn runs_posts(&self) -> bool {
        matches!(self, Self::Posts | Self::All)
    }

    /// Returns true if this process runs the search service.
    #[must_use]
    pub const fn runs_search(&self) -> bool {
        matches!(self, Self::Search | Self::All)
    }

    /// Returns true if this process runs the media service.
    #[must_use]
    pub const fn runs_media(&self) -> bool {
        matches!(self, Self::Media | Self::All)
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posts => write!(f, "posts"),
            Self::Search => write!(f, "search"),
            Self::Media => write!(f, "media"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for ServiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "posts" | "post" => Ok(Self::Posts),
            "search" => Ok(Self::Search),
            "media" => Ok(Self::Media),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown service role: {}", s)),
        }
    }
}
