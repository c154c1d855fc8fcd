use crate::traits::SearchRepository;
use agora_core::{AgoraResult, PostId, SearchEntry};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Search entries kept in a map, matched by lowercase term.
#[derive(Default)]
pub struct InMemorySearchRepository {
    entries: RwLock<HashMap<PostId, SearchEntry>>,
}

impl InMemorySearchRepository {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Number of query-term occurrences in `content`.
fn score(content: &str, terms: &[String]) -> usize {
    let content = content.to_lowercase();
    terms.iter().map(|term| content.matches(term.as_str()).count()).sum()
}

#[async_trait]
impl SearchRepository for InMemorySearchRepository {
    async fn upsert(&self, entry: &SearchEntry) -> AgoraResult<()> {
        self.entries.write().insert(entry.post_id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_by_post_id(&self, post_id: &PostId) -> AgoraResult<bool> {
        Ok(self.entries.write().remove(post_id).is_some())
    }

    async fn find_by_post_id(&self, post_id: &PostId) -> AgoraResult<Option<SearchEntry>> {
        Ok(self.entries.read().get(post_id).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> AgoraResult<Vec<SearchEntry>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(usize, SearchEntry)> = self
            .entries
            .read()
            .values()
            .filter_map(|entry| {
                let score = score(&entry.content, &terms);
                (score > 0).then(|| (score, entry.clone()))
            })
            .collect();

        hits.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .cmp(a_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(hits.into_iter().take(limit).map(|(_, entry)| entry).collect())
    }
}
