//! Application builder.

use agora_config::{AppConfig, RedisConfig, ServiceRole};
use agora_core::{AgoraError, AgoraResult};
use agora_messaging::{
    AmqpTransport, BrokerTransport, ConnectionManager, EventConsumer, EventPublisher, SubscriptionInfo,
};
use agora_repository::{
    InMemoryMediaRepository, InMemoryObjectStore, InMemoryPostRepository, InMemorySearchRepository,
};
use agora_service::{
    create_pool, register_media_handlers, register_search_handlers, CacheCoordinator, CacheInterface,
    MediaService, MediaServiceImpl, PostService, PostServiceImpl, RedisCacheService, SearchService,
    SearchServiceImpl,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Builds an [`App`] from configuration.
///
/// The broker transport defaults to AMQP and the cache to Redis per
/// `redis.enabled`; both can be replaced, which is how tests run a whole
/// deployment in one process.
pub struct AppBuilder {
    config: AppConfig,
    transport: Option<Arc<dyn BrokerTransport>>,
    cache: Option<Arc<dyn CacheInterface>>,
}

impl AppBuilder {
    /// Creates a new application builder.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            transport: None,
            cache: None,
        }
    }

    /// Sets the broker transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn BrokerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the cache backend.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheInterface>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Connects to the broker and starts the services of the configured role.
    ///
    /// Fails if the broker stays unreachable for every allowed attempt or a
    /// subscription cannot be registered.
    pub async fn start(self) -> AgoraResult<App> {
        let role = self.config.app.role;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(AmqpTransport::new()) as Arc<dyn BrokerTransport>);
        let connection = Arc::new(ConnectionManager::new(self.config.broker.clone(), transport));

        if let Err(e) = connection.connect().await {
            error!(error = %e, "Broker unreachable, giving up");
            return Err(e.into());
        }

        let consumer = EventConsumer::new(Arc::clone(&connection), self.config.broker.on_handler_error);
        let mut app = App {
            role,
            connection,
            consumer,
            posts: None,
            search: None,
            media: None,
        };

        if role.runs_search() {
            let search: Arc<dyn SearchService> =
                Arc::new(SearchServiceImpl::new(Arc::new(InMemorySearchRepository::new())));
            register_search_handlers(&app.consumer, Arc::clone(&search))
                .await
                .map_err(|e| fatal_subscription("search", e.into()))?;
            app.search = Some(search);
        }

        if role.runs_media() {
            let media: Arc<dyn MediaService> = Arc::new(MediaServiceImpl::new(
                Arc::new(InMemoryMediaRepository::new()),
                Arc::new(InMemoryObjectStore::default()),
            ));
            register_media_handlers(&app.consumer, Arc::clone(&media))
                .await
                .map_err(|e| fatal_subscription("media", e.into()))?;
            app.media = Some(media);
        }

        if role.runs_posts() {
            let cache = match self.cache {
                Some(cache) => cache,
                None => build_cache(&self.config.redis, self.config.cache.scan_batch_size).await,
            };
            let posts: Arc<dyn PostService> = Arc::new(PostServiceImpl::new(
                Arc::new(InMemoryPostRepository::new()),
                EventPublisher::new(Arc::clone(&app.connection)),
                CacheCoordinator::new(cache)
                    .with_op_timeout(self.config.cache.op_timeout())
                    .with_invalidation_timeout(self.config.cache.invalidation_timeout()),
                self.config.cache.clone(),
            ));
            app.posts = Some(posts);
        }

        info!(role = %role, subscriptions = app.consumer.subscriptions().len(), "Services started");
        Ok(app)
    }
}

fn fatal_subscription(service: &str, e: AgoraError) -> AgoraError {
    error!(service, error = %e, "Failed to register subscriptions");
    e
}

/// Redis when enabled and reachable; otherwise a disabled cache that sends
/// every read to the system of record.
async fn build_cache(config: &RedisConfig, scan_batch_size: usize) -> Arc<dyn CacheInterface> {
    if !config.enabled {
        info!("Redis disabled, caching is off");
        return Arc::new(RedisCacheService::disabled());
    }

    match create_pool(config).await {
        Ok(pool) => Arc::new(RedisCacheService::with_scan_batch(Arc::new(pool), scan_batch_size)),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, caching is off");
            Arc::new(RedisCacheService::disabled())
        }
    }
}

/// A running service process.
pub struct App {
    role: ServiceRole,
    connection: Arc<ConnectionManager>,
    consumer: EventConsumer,
    posts: Option<Arc<dyn PostService>>,
    search: Option<Arc<dyn SearchService>>,
    media: Option<Arc<dyn MediaService>>,
}

impl App {
    /// Role this process runs.
    pub fn role(&self) -> ServiceRole {
        self.role
    }

    /// Shared broker connection.
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Posts service, when the role runs it.
    pub fn posts(&self) -> Option<Arc<dyn PostService>> {
        self.posts.clone()
    }

    /// Search service, when the role runs it.
    pub fn search(&self) -> Option<Arc<dyn SearchService>> {
        self.search.clone()
    }

    /// Media service, when the role runs it.
    pub fn media(&self) -> Option<Arc<dyn MediaService>> {
        self.media.clone()
    }

    /// Active subscriptions.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.consumer.subscriptions()
    }

    /// Resolves once a subscription stopped because the broker stayed
    /// unreachable. Never resolves for a role without subscriptions.
    pub async fn subscription_lost(&self) {
        self.consumer.subscription_lost().await;
    }

    /// Stops the consumers, then closes the broker connection.
    pub async fn shutdown(self) -> AgoraResult<()> {
        self.consumer.shutdown();
        self.connection.close().await?;
        info!(role = %self.role, "Shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("role", &self.role)
            .field("connected", &self.connection.is_connected())
            .finish_non_exhaustive()
    }
}
