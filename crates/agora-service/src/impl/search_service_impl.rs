//! Search service implementation.

use crate::search_service::SearchService;
use agora_core::{AgoraError, AgoraResult, PostCreated, PostDeleted, SearchEntry};
use agora_repository::SearchRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of search results.
pub const SEARCH_LIMIT: usize = 10;

/// Search service over the secondary index.
pub struct SearchServiceImpl {
    index: Arc<dyn SearchRepository>,
}

impl SearchServiceImpl {
    /// Creates a new search service.
    pub fn new(index: Arc<dyn SearchRepository>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SearchService for SearchServiceImpl {
    async fn search(&self, query: &str) -> AgoraResult<Vec<SearchEntry>> {
        if query.trim().is_empty() {
            return Err(AgoraError::validation("Search query is required"));
        }

        let results = self.index.search(query, SEARCH_LIMIT).await?;
        debug!(query, hits = results.len(), "Search executed");
        Ok(results)
    }

    async fn index_post(&self, event: PostCreated) -> AgoraResult<()> {
        let post_id = event.post_id.clone();
        self.index.upsert(&SearchEntry::from(event)).await?;
        info!(post_id = %post_id, "Post indexed for search");
        Ok(())
    }

    async fn remove_post(&self, event: &PostDeleted) -> AgoraResult<bool> {
        let removed = self.index.delete_by_post_id(&event.post_id).await?;
        info!(post_id = %event.post_id, removed, "Processed search removal");
        Ok(removed)
    }
}
