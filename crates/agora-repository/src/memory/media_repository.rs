use crate::traits::MediaRepository;
use agora_core::{AgoraResult, Media, MediaId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Media records kept in a map.
#[derive(Default)]
pub struct InMemoryMediaRepository {
    media: RwLock<HashMap<MediaId, Media>>,
}

impl InMemoryMediaRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `records`.
    pub fn with_media(records: Vec<Media>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.media.write();
            for media in records {
                map.insert(media.id.clone(), media);
            }
        }
        repo
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn save(&self, media: &Media) -> AgoraResult<Media> {
        self.media.write().insert(media.id.clone(), media.clone());
        Ok(media.clone())
    }

    async fn find_by_ids(&self, ids: &[MediaId]) -> AgoraResult<Vec<Media>> {
        let media = self.media.read();
        Ok(ids.iter().filter_map(|id| media.get(id).cloned()).collect())
    }

    async fn find_all(&self) -> AgoraResult<Vec<Media>> {
        let mut all: Vec<Media> = self.media.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete(&self, id: &MediaId) -> AgoraResult<bool> {
        Ok(self.media.write().remove(id).is_some())
    }
}
