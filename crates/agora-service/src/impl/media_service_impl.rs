//! Media service implementation.

use crate::dto::UploadMediaRequest;
use crate::media_service::MediaService;
use agora_core::{AgoraResult, Media, MediaId, PostDeleted};
use agora_repository::{MediaRepository, ObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Media service over the media records and the object store.
pub struct MediaServiceImpl {
    media: Arc<dyn MediaRepository>,
    objects: Arc<dyn ObjectStore>,
}

impl MediaServiceImpl {
    /// Creates a new media service.
    pub fn new(media: Arc<dyn MediaRepository>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { media, objects }
    }
}

#[async_trait]
impl MediaService for MediaServiceImpl {
    async fn upload(&self, request: UploadMediaRequest) -> AgoraResult<Media> {
        request.validate()?;
        info!(
            file_name = %request.original_name,
            mime_type = %request.mime_type,
            size = request.bytes.len(),
            "Uploading media"
        );

        let stored = self
            .objects
            .upload(&request.bytes, &request.original_name, &request.mime_type)
            .await?;

        let media = Media {
            id: MediaId::new(),
            public_id: stored.public_id,
            url: stored.url,
            original_name: request.original_name,
            mime_type: request.mime_type,
            user_id: request.user_id,
            created_at: Utc::now(),
        };

        match self.media.save(&media).await {
            Ok(saved) => {
                info!(media_id = %saved.id, public_id = %saved.public_id, "Media uploaded");
                Ok(saved)
            }
            Err(e) => {
                if let Err(cleanup) = self.objects.delete(&media.public_id).await {
                    warn!(public_id = %media.public_id, error = %cleanup, "Orphaned object left in store");
                }
                Err(e)
            }
        }
    }

    async fn list_media(&self) -> AgoraResult<Vec<Media>> {
        self.media.find_all().await
    }

    async fn remove_for_post(&self, event: &PostDeleted) -> AgoraResult<usize> {
        if event.media_ids.is_empty() {
            return Ok(0);
        }

        let attached = self.media.find_by_ids(&event.media_ids).await?;
        for media in &attached {
            self.objects.delete(&media.public_id).await?;
            self.media.delete(&media.id).await?;
            info!(media_id = %media.id, post_id = %event.post_id, "Deleted media of deleted post");
        }

        info!(
            post_id = %event.post_id,
            requested = event.media_ids.len(),
            removed = attached.len(),
            "Processed media deletion for post"
        );
        Ok(attached.len())
    }
}
