//! Subscriptions connecting the consumer to the services.
//!
//! Handler errors are returned to the dispatcher so the configured failure
//! policy decides between acknowledging and requeueing.

use crate::media_service::MediaService;
use crate::search_service::SearchService;
use agora_core::{PostCreated, PostDeleted};
use agora_messaging::{Disposition, EventConsumer, MessagingResult};
use std::sync::Arc;
use tracing::info;

/// Subscribes the search projection to `post.created` and `post.deleted`.
pub async fn register_search_handlers(
    consumer: &EventConsumer,
    search: Arc<dyn SearchService>,
) -> MessagingResult<()> {
    let service = Arc::clone(&search);
    consumer
        .subscribe_event(move |event: PostCreated| {
            let service = Arc::clone(&service);
            async move {
                service.index_post(event).await?;
                Ok(Disposition::Ack)
            }
        })
        .await?;

    consumer
        .subscribe_event(move |event: PostDeleted| {
            let service = Arc::clone(&search);
            async move {
                service.remove_post(&event).await?;
                Ok(Disposition::Ack)
            }
        })
        .await?;

    info!("Search handlers registered");
    Ok(())
}

/// Subscribes media cleanup to `post.deleted`.
pub async fn register_media_handlers(
    consumer: &EventConsumer,
    media: Arc<dyn MediaService>,
) -> MessagingResult<()> {
    consumer
        .subscribe_event(move |event: PostDeleted| {
            let service = Arc::clone(&media);
            async move {
                service.remove_for_post(&event).await?;
                Ok(Disposition::Ack)
            }
        })
        .await?;

    info!("Media handlers registered");
    Ok(())
}
