//! Posts, search, and media services wired over the in-process broker.

use agora_config::{BrokerConfig, CacheConfig, HandlerFailurePolicy};
use agora_core::{Media, MediaId, PostId, UserId};
use agora_messaging::{ConnectionManager, EventConsumer, EventPublisher, InMemoryBroker};
use agora_repository::{
    InMemoryMediaRepository, InMemoryObjectStore, InMemoryPostRepository, InMemorySearchRepository,
};
use agora_service::{
    register_media_handlers, register_search_handlers, CacheCoordinator, CacheInterface, CreatePostRequest,
    InMemoryCache, MediaService, MediaServiceImpl, PostService, PostServiceImpl, SearchService,
    SearchServiceImpl,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

struct Deployment {
    broker: InMemoryBroker,
    cache: Arc<InMemoryCache>,
    index: Arc<InMemorySearchRepository>,
    store: Arc<InMemoryObjectStore>,
    posts: PostServiceImpl,
    search: Arc<SearchServiceImpl>,
    media: Arc<MediaServiceImpl>,
    // Each service keeps its own connection, as separate processes would.
    _search_consumer: EventConsumer,
    _media_consumer: EventConsumer,
}

fn connection(broker: &InMemoryBroker) -> Arc<ConnectionManager> {
    let config = BrokerConfig {
        retry_delay_ms: 1,
        ..BrokerConfig::default()
    };
    Arc::new(ConnectionManager::new(config, Arc::new(broker.clone())))
}

fn media(id: &str) -> Media {
    Media {
        id: MediaId::from(id),
        public_id: format!("obj-{}", id),
        url: format!("memory://objects/obj-{}", id),
        original_name: format!("{}.png", id),
        mime_type: "image/png".to_string(),
        user_id: UserId::from("u1"),
        created_at: Utc::now(),
    }
}

async fn deploy(seed_media: Vec<Media>) -> Deployment {
    let broker = InMemoryBroker::new();

    let index = Arc::new(InMemorySearchRepository::new());
    let search = Arc::new(SearchServiceImpl::new(index.clone()));
    let search_consumer = EventConsumer::new(connection(&broker), HandlerFailurePolicy::Ack);
    register_search_handlers(&search_consumer, search.clone()).await.unwrap();

    let store = Arc::new(InMemoryObjectStore::default());
    for item in &seed_media {
        store.insert(item.public_id.clone(), vec![0]);
    }
    let media = Arc::new(MediaServiceImpl::new(
        Arc::new(InMemoryMediaRepository::with_media(seed_media)),
        store.clone(),
    ));
    let media_consumer = EventConsumer::new(connection(&broker), HandlerFailurePolicy::Ack);
    register_media_handlers(&media_consumer, media.clone()).await.unwrap();

    let cache = Arc::new(InMemoryCache::new());
    let posts = PostServiceImpl::new(
        Arc::new(InMemoryPostRepository::new()),
        EventPublisher::new(connection(&broker)),
        CacheCoordinator::new(cache.clone()),
        CacheConfig::default(),
    );

    Deployment {
        broker,
        cache,
        index,
        store,
        posts,
        search,
        media,
        _search_consumer: search_consumer,
        _media_consumer: media_consumer,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

fn request(content: &str, media_ids: &[&str]) -> CreatePostRequest {
    CreatePostRequest {
        user_id: UserId::from("u1"),
        content: content.to_string(),
        media_ids: media_ids.iter().map(|id| MediaId::from(*id)).collect(),
    }
}

#[tokio::test]
async fn test_created_post_becomes_searchable() {
    let d = deploy(vec![]).await;

    let post = d.posts.create_post(request("hello from rust", &[])).await.unwrap();

    let index = d.index.clone();
    eventually(move || index.len() == 1).await;

    let hits = d.search.search("rust").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, post.id);
    assert_eq!(hits[0].content, "hello from rust");
}

#[tokio::test]
async fn test_deleted_post_removes_exactly_its_media() {
    let d = deploy(vec![media("m1"), media("m2"), media("m3")]).await;

    let post = d.posts.create_post(request("with pictures", &["m1", "m2"])).await.unwrap();
    let index = d.index.clone();
    eventually(move || index.len() == 1).await;

    d.posts.delete_post(&post.id, &UserId::from("u1")).await.unwrap();

    let store = d.store.clone();
    eventually(move || store.deleted().len() == 2).await;
    let index = d.index.clone();
    eventually(move || index.is_empty()).await;

    let mut deleted = d.store.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["obj-m1".to_string(), "obj-m2".to_string()]);
    assert!(d.store.contains("obj-m3"));

    let remaining: Vec<String> = d
        .media
        .list_media()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id.into_inner())
        .collect();
    assert_eq!(remaining, vec!["m3".to_string()]);
}

#[tokio::test]
async fn test_write_invalidates_entity_and_every_listing() {
    let d = deploy(vec![]).await;
    let post = d.posts.create_post(request("first", &[])).await.unwrap();

    d.posts.get_post(&post.id).await.unwrap();
    d.posts.list_posts(1).await.unwrap();
    d.posts.list_posts(2).await.unwrap();
    assert_eq!(d.cache.keys().len(), 3);

    d.posts.delete_post(&post.id, &UserId::from("u1")).await.unwrap();

    for key in [format!("entity:{}", post.id), "listing:1".to_string(), "listing:2".to_string()] {
        assert!(!d.cache.exists(&key).await.unwrap(), "{} survived invalidation", key);
    }
}

#[tokio::test]
async fn test_post_writes_survive_a_broker_restart() {
    let d = deploy(vec![]).await;
    d.posts.create_post(request("before", &[])).await.unwrap();

    d.broker.disconnect_all();
    let post = d.posts.create_post(request("after", &[])).await.unwrap();

    assert_eq!(d.broker.stats().published, 2);
    assert_eq!(d.posts.get_post(&post.id).await.unwrap().content, "after");
}

#[tokio::test]
async fn test_unknown_post_cannot_be_deleted() {
    let d = deploy(vec![]).await;
    let result = d.posts.delete_post(&PostId::from("nope"), &UserId::from("u1")).await;

    assert!(result.is_err());
    assert_eq!(d.broker.stats().published, 0);
}
