//! Post service implementation.

use crate::cache::{cache_keys, CacheCoordinator};
use crate::dto::CreatePostRequest;
use crate::post_service::PostService;
use agora_config::CacheConfig;
use agora_core::{
    AgoraError, AgoraResult, PageRequest, Post, PostCreated, PostDeleted, PostId, PostListing,
    UserId,
};
use agora_messaging::{EventPublisher, MessagingResult};
use agora_repository::PostRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Post service over a repository, the event publisher, and the cache.
pub struct PostServiceImpl {
    posts: Arc<dyn PostRepository>,
    publisher: EventPublisher,
    cache: CacheCoordinator,
    settings: CacheConfig,
}

impl PostServiceImpl {
    /// Creates a new post service.
    pub fn new(
        posts: Arc<dyn PostRepository>,
        publisher: EventPublisher,
        cache: CacheCoordinator,
        settings: CacheConfig,
    ) -> Self {
        Self {
            posts,
            publisher,
            cache,
            settings,
        }
    }

    /// Invalidates after a committed write whether or not the event went out,
    /// then reports the publish outcome.
    async fn finish_write(&self, id: &PostId, published: MessagingResult<()>) -> AgoraResult<()> {
        self.cache.invalidate(id.as_str()).await;

        published.map_err(|e| {
            error!(post_id = %id, error = %e, "Post committed but its event was not published");
            AgoraError::from(e)
        })
    }
}

#[async_trait]
impl PostService for PostServiceImpl {
    async fn create_post(&self, request: CreatePostRequest) -> AgoraResult<Post> {
        request.validate()?;

        let post = Post::new(request.user_id, request.content, request.media_ids);
        let saved = self.posts.save(&post).await?;

        let published = self.publisher.publish_event(&PostCreated::from(&saved)).await;
        self.finish_write(&saved.id, published).await?;

        info!(post_id = %saved.id, user_id = %saved.user_id, "Post created");
        Ok(saved)
    }

    async fn get_post(&self, id: &PostId) -> AgoraResult<Post> {
        debug!(post_id = %id, "Getting post");

        let key = cache_keys::entity(id);
        self.cache
            .read_through(&key, self.settings.entity_ttl(), || async {
                self.posts
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AgoraError::not_found("Post", id))
            })
            .await
    }

    async fn list_posts(&self, page: usize) -> AgoraResult<PostListing> {
        let page = page.max(1);
        debug!(page, "Listing posts");

        let key = cache_keys::listing(page);
        let request = PageRequest::from_one_based(page, self.settings.listing_page_size);

        self.cache
            .read_through(&key, self.settings.listing_ttl(), || async {
                let found = self.posts.find_page(request).await?;
                Ok(PostListing {
                    total_pages: found.total_pages(),
                    total_posts: found.total_elements,
                    current_page: page,
                    posts: found.content,
                })
            })
            .await
    }

    async fn delete_post(&self, id: &PostId, user_id: &UserId) -> AgoraResult<()> {
        let post = self
            .posts
            .find_by_id(id)
            .await?
            .filter(|post| post.is_owned_by(user_id))
            .ok_or_else(|| AgoraError::not_found("Post", id))?;

        if !self.posts.delete(&post.id).await? {
            return Err(AgoraError::not_found("Post", id));
        }

        let published = self.publisher.publish_event(&PostDeleted::from(&post)).await;
        self.finish_write(&post.id, published).await?;

        info!(post_id = %post.id, media = post.media_ids.len(), "Post deleted");
        Ok(())
    }
}

impl std::fmt::Debug for PostServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostServiceImpl").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheInterface, InMemoryCache};
    use agora_config::BrokerConfig;
    use agora_core::MediaId;
    use agora_messaging::{ConnectionManager, InMemoryBroker};
    use agora_repository::InMemoryPostRepository;
    use std::time::Duration;

    struct Fixture {
        broker: InMemoryBroker,
        cache: Arc<InMemoryCache>,
        service: PostServiceImpl,
    }

    fn fixture(max_attempts: u32) -> Fixture {
        let broker = InMemoryBroker::new();
        let config = BrokerConfig {
            max_attempts,
            retry_delay_ms: 1,
            ..Default::default()
        };
        let connection = Arc::new(ConnectionManager::new(config, Arc::new(broker.clone())));
        let cache = Arc::new(InMemoryCache::new());

        let service = PostServiceImpl::new(
            Arc::new(InMemoryPostRepository::new()),
            EventPublisher::new(connection),
            CacheCoordinator::new(cache.clone()),
            CacheConfig {
                listing_page_size: 2,
                ..Default::default()
            },
        );

        Fixture {
            broker,
            cache,
            service,
        }
    }

    fn create(content: &str, media: &[&str]) -> CreatePostRequest {
        CreatePostRequest {
            user_id: UserId::from("u1"),
            content: content.to_string(),
            media_ids: media.iter().map(|id| MediaId::from(*id)).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_publishes_and_invalidates() {
        let f = fixture(3);
        f.cache
            .set_raw("listing:1", "{}", Duration::from_secs(60))
            .await
            .unwrap();

        let post = f.service.create_post(create("hello", &[])).await.unwrap();

        assert_eq!(post.content, "hello");
        assert_eq!(f.broker.stats().published, 1);
        assert!(f.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_content() {
        let f = fixture(3);
        let result = f.service.create_post(create("   ", &[])).await;

        assert!(matches!(result, Err(AgoraError::Validation(_))));
        assert_eq!(f.broker.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_get_post_is_cached() {
        let f = fixture(3);
        let post = f.service.create_post(create("hello", &[])).await.unwrap();

        let first = f.service.get_post(&post.id).await.unwrap();
        assert_eq!(first, post);
        assert_eq!(f.cache.keys(), vec![format!("entity:{}", post.id)]);

        let second = f.service.get_post(&post.id).await.unwrap();
        assert_eq!(second, post);
    }

    #[tokio::test]
    async fn test_missing_post_is_not_cached() {
        let f = fixture(3);
        let result = f.service.get_post(&PostId::from("nope")).await;

        assert!(matches!(result, Err(AgoraError::NotFound { .. })));
        assert!(f.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_listing_pages_and_invalidation() {
        let f = fixture(3);
        for i in 0..3 {
            f.service.create_post(create(&format!("post {}", i), &[])).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let first = f.service.list_posts(1).await.unwrap();
        assert_eq!(first.posts.len(), 2);
        assert_eq!(first.posts[0].content, "post 2");
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.total_posts, 3);

        let second = f.service.list_posts(2).await.unwrap();
        assert_eq!(second.current_page, 2);
        assert_eq!(second.posts.len(), 1);
        assert_eq!(f.cache.keys(), vec!["listing:1".to_string(), "listing:2".to_string()]);

        f.service.create_post(create("post 3", &[])).await.unwrap();
        assert!(f.cache.keys().is_empty());
        assert_eq!(f.service.list_posts(1).await.unwrap().total_posts, 4);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let f = fixture(3);
        f.service.create_post(create("only", &[])).await.unwrap();

        let listing = f.service.list_posts(usize::MAX).await.unwrap();

        assert!(listing.posts.is_empty());
        assert_eq!(listing.current_page, usize::MAX);
        assert_eq!(listing.total_posts, 1);
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let f = fixture(3);
        let post = f.service.create_post(create("mine", &["m1"])).await.unwrap();

        let result = f.service.delete_post(&post.id, &UserId::from("u2")).await;
        assert!(matches!(result, Err(AgoraError::NotFound { .. })));

        f.service.delete_post(&post.id, &UserId::from("u1")).await.unwrap();
        assert!(f.service.get_post(&post.id).await.is_err());
        assert_eq!(f.broker.stats().published, 2);
    }

    #[tokio::test]
    async fn test_publish_failure_still_invalidates() {
        let f = fixture(1);
        f.broker.fail_next_connects(1);
        f.cache
            .set_raw("listing:1", "{}", Duration::from_secs(60))
            .await
            .unwrap();

        let result = f.service.create_post(create("hello", &[])).await;

        assert!(matches!(result, Err(AgoraError::Messaging(_))));
        assert!(f.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_writes_or_reads() {
        let f = fixture(3);
        f.cache.set_online(false);

        let post = f.service.create_post(create("hello", &[])).await.unwrap();
        assert_eq!(f.service.get_post(&post.id).await.unwrap(), post);
        assert_eq!(f.service.list_posts(1).await.unwrap().total_posts, 1);
    }
}
