//! Cache key generators.
//!
//! Keys are shared with every process reading the same cache, so the format
//! is part of the contract: `entity:{id}` for single posts and
//! `listing:{page}` for listing pages.

use std::fmt::Display;

/// Pattern matching every cached listing page.
pub const LISTING_PATTERN: &str = "listing:*";

/// Key for a single entity.
#[must_use]
pub fn entity(id: impl Display) -> String {
    format!("entity:{}", id)
}

/// Key for a 1-based listing page.
#[must_use]
pub fn listing(page: usize) -> String {
    format!("listing:{}", page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::PostId;

    #[test]
    fn test_entity_key() {
        assert_eq!(entity(PostId::from("p1")), "entity:p1");
    }

    #[test]
    fn test_listing_key_matches_pattern() {
        assert_eq!(listing(2), "listing:2");
        assert!(listing(2).starts_with(LISTING_PATTERN.trim_end_matches('*')));
    }
}
