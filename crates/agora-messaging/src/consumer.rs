//! Subscriptions and message dispatch.
//!
//! Every subscription owns an exclusive queue bound to one routing key and a
//! dedicated task that drains it. A delivery is settled only after its handler
//! returned, so a process that dies mid-handler gets the message redelivered.

use crate::connection::ConnectionManager;
use crate::error::MessagingResult;
use crate::metrics::MessagingMetrics;
use crate::transport::{Delivery, DeliveryStream};
use agora_config::HandlerFailurePolicy;
use agora_core::DomainEvent;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What to do with a delivery once its handler finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge; the message is done.
    Ack,
    /// Put the message back on the queue for redelivery.
    Requeue,
    /// Reject without requeue; the message is discarded.
    Drop,
}

impl Disposition {
    /// Metric label for the disposition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Requeue => "requeue",
            Disposition::Drop => "drop",
        }
    }
}

/// Outcome of an event handler.
pub type HandlerResult = Result<Disposition, anyhow::Error>;

/// A decoded message handed to a handler.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    /// Routing key the message was published with.
    pub routing_key: String,
    /// JSON body.
    pub body: serde_json::Value,
    /// True if the broker delivered this message before.
    pub redelivered: bool,
}

impl IncomingEvent {
    /// Decodes the body into a typed event. Unknown fields are ignored.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Handles messages of one subscription.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes one message and decides its disposition.
    async fn handle(&self, event: IncomingEvent) -> HandlerResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(IncomingEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: IncomingEvent) -> HandlerResult {
        (self.0)(event).await
    }
}

struct TypedHandler<E, F> {
    handler: F,
    _event: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E, F, Fut> EventHandler for TypedHandler<E, F>
where
    E: DomainEvent,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, event: IncomingEvent) -> HandlerResult {
        match event.decode::<E>() {
            Ok(decoded) => (self.handler)(decoded).await,
            Err(e) => {
                warn!(
                    routing_key = %event.routing_key,
                    error = %e,
                    "Dropping event with malformed body"
                );
                Ok(Disposition::Drop)
            }
        }
    }
}

struct SubscriptionState {
    queue: Mutex<String>,
    processed: AtomicU64,
    failed: AtomicU64,
    resubscribed: AtomicU64,
}

impl SubscriptionState {
    fn new(queue: String) -> Self {
        Self {
            queue: Mutex::new(queue),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            resubscribed: AtomicU64::new(0),
        }
    }
}

struct Subscription {
    routing_key: String,
    consumer_tag: String,
    state: Arc<SubscriptionState>,
    task: JoinHandle<()>,
}

/// Snapshot of one subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    /// Routing key the queue is bound with.
    pub routing_key: String,
    /// Server-named queue currently consumed.
    pub queue: String,
    /// Consumer tag on the channel.
    pub consumer_tag: String,
    /// Messages whose handler completed.
    pub processed: u64,
    /// Messages whose handler errored or panicked.
    pub failed: u64,
    /// Times the queue was declared again after the delivery stream ended.
    pub resubscribed: u64,
    /// Whether the receive loop is still running.
    pub running: bool,
}

/// Registers handlers and runs one receive loop per subscription.
///
/// When a delivery stream ends because the broker connection dropped, the
/// loop reconnects through the shared [`ConnectionManager`] and binds a fresh
/// exclusive queue. Messages published while no queue was bound are lost. If
/// reconnecting exhausts its attempts the subscription stops and
/// [`EventConsumer::subscription_lost`] resolves.
pub struct EventConsumer {
    connection: Arc<ConnectionManager>,
    policy: HandlerFailurePolicy,
    subscriptions: Mutex<Vec<Subscription>>,
    lost: Arc<watch::Sender<bool>>,
}

impl EventConsumer {
    /// Creates a consumer on a shared connection.
    ///
    /// `policy` decides the fate of messages whose handler errored or panicked.
    pub fn new(connection: Arc<ConnectionManager>, policy: HandlerFailurePolicy) -> Self {
        Self {
            connection,
            policy,
            subscriptions: Mutex::new(Vec::new()),
            lost: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Subscribes a closure receiving the raw JSON body.
    pub async fn subscribe<F, Fut>(&self, routing_key: &str, handler: F) -> MessagingResult<String>
    where
        F: Fn(IncomingEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe_handler(routing_key, Arc::new(FnHandler(handler)))
            .await
    }

    /// Subscribes a closure to a typed domain event under its routing key.
    ///
    /// Bodies that do not decode into `E` are dropped with a warning.
    pub async fn subscribe_event<E, F, Fut>(&self, handler: F) -> MessagingResult<String>
    where
        E: DomainEvent,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = TypedHandler {
            handler,
            _event: PhantomData,
        };
        self.subscribe_handler(E::ROUTING_KEY, Arc::new(handler)).await
    }

    /// Declares an exclusive queue, binds it under `routing_key`, and starts
    /// dispatching to `handler`. Returns the queue name.
    pub async fn subscribe_handler(
        &self,
        routing_key: &str,
        handler: Arc<dyn EventHandler>,
    ) -> MessagingResult<String> {
        let consumer_tag = format!("agora-{}", Uuid::new_v4().simple());
        let (queue, deliveries) = open_queue(&self.connection, routing_key, &consumer_tag).await?;

        let state = Arc::new(SubscriptionState::new(queue.clone()));
        let worker = Worker {
            connection: Arc::clone(&self.connection),
            routing_key: routing_key.to_string(),
            consumer_tag: consumer_tag.clone(),
            handler,
            policy: self.policy,
            state: Arc::clone(&state),
            lost: Arc::clone(&self.lost),
        };
        let span = info_span!("subscription", routing_key = %routing_key, consumer_tag = %consumer_tag);
        let task = tokio::spawn(worker.run(deliveries).instrument(span));

        info!(
            exchange = %self.connection.exchange(),
            routing_key,
            queue = %queue,
            "Subscribed"
        );

        self.subscriptions.lock().push(Subscription {
            routing_key: routing_key.to_string(),
            consumer_tag,
            state,
            task,
        });

        Ok(queue)
    }

    /// Returns a snapshot of every subscription.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.subscriptions
            .lock()
            .iter()
            .map(|sub| SubscriptionInfo {
                routing_key: sub.routing_key.clone(),
                queue: sub.state.queue.lock().clone(),
                consumer_tag: sub.consumer_tag.clone(),
                processed: sub.state.processed.load(Ordering::Relaxed),
                failed: sub.state.failed.load(Ordering::Relaxed),
                resubscribed: sub.state.resubscribed.load(Ordering::Relaxed),
                running: !sub.task.is_finished(),
            })
            .collect()
    }

    /// Resolves once a subscription stopped because the broker could not be
    /// reached again.
    pub async fn subscription_lost(&self) {
        let mut lost = self.lost.subscribe();
        // The sender lives as long as `self`, so this only returns on loss.
        let _ = lost.wait_for(|lost| *lost).await;
    }

    /// Stops every receive loop. Unsettled deliveries go back to the broker
    /// when the connection closes.
    pub fn shutdown(&self) {
        let subscriptions: Vec<Subscription> = self.subscriptions.lock().drain(..).collect();
        for sub in &subscriptions {
            sub.task.abort();
        }
        info!(count = subscriptions.len(), "Consumer subscriptions stopped");
    }
}

impl Drop for EventConsumer {
    fn drop(&mut self) {
        for sub in self.subscriptions.get_mut().iter() {
            sub.task.abort();
        }
    }
}

async fn open_queue(
    connection: &ConnectionManager,
    routing_key: &str,
    consumer_tag: &str,
) -> MessagingResult<(String, DeliveryStream)> {
    let channel = connection.channel().await?;
    let queue = channel.declare_exclusive_queue().await?;
    channel
        .bind_queue(&queue, connection.exchange(), routing_key)
        .await?;
    let deliveries = channel.consume(&queue, consumer_tag).await?;
    Ok((queue, deliveries))
}

struct Worker {
    connection: Arc<ConnectionManager>,
    routing_key: String,
    consumer_tag: String,
    handler: Arc<dyn EventHandler>,
    policy: HandlerFailurePolicy,
    state: Arc<SubscriptionState>,
    lost: Arc<watch::Sender<bool>>,
}

enum Resume {
    Stream(DeliveryStream),
    Closed,
    Lost,
}

impl Worker {
    async fn run(self, mut deliveries: DeliveryStream) {
        loop {
            while let Some(next) = deliveries.next().await {
                match next {
                    Ok(delivery) => dispatch(self.handler.as_ref(), delivery, self.policy, &self.state).await,
                    Err(e) => error!(error = %e, "Delivery stream error"),
                }
            }

            match self.resubscribe().await {
                Resume::Stream(stream) => deliveries = stream,
                Resume::Closed => {
                    info!("Connection closed, subscription stopped");
                    return;
                }
                Resume::Lost => {
                    self.lost.send_replace(true);
                    return;
                }
            }
        }
    }

    /// Binds a fresh queue once the old delivery stream ended. Connection
    /// exhaustion is final; transient channel errors get up to
    /// `max_attempts` tries.
    async fn resubscribe(&self) -> Resume {
        let config = self.connection.config();
        let max_attempts = config.max_attempts.max(1);
        let stale = self.state.queue.lock().clone();
        warn!(queue = %stale, "Delivery stream ended, resubscribing");

        for attempt in 1..=max_attempts {
            if self.connection.is_closed() {
                return Resume::Closed;
            }
            tokio::time::sleep(config.retry_delay()).await;
            if self.connection.is_closed() {
                return Resume::Closed;
            }

            match open_queue(&self.connection, &self.routing_key, &self.consumer_tag).await {
                Ok((queue, stream)) => {
                    info!(queue = %queue, attempt, "Resubscribed");
                    *self.state.queue.lock() = queue;
                    self.state.resubscribed.fetch_add(1, Ordering::Relaxed);
                    return Resume::Stream(stream);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Resubscribe failed");
                }
                Err(e) => {
                    error!(attempt, error = %e, "Could not resubscribe, subscription stopped");
                    return Resume::Lost;
                }
            }
        }
        Resume::Lost
    }
}

async fn dispatch(
    handler: &dyn EventHandler,
    delivery: Delivery,
    policy: HandlerFailurePolicy,
    stats: &SubscriptionState,
) {
    let routing_key = delivery.routing_key.clone();
    let redelivered = delivery.redelivered;

    let body = match serde_json::from_slice::<serde_json::Value>(&delivery.payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(routing_key = %routing_key, error = %e, "Dropping message with invalid JSON payload");
            settle(delivery, Disposition::Drop).await;
            return;
        }
    };

    let event = IncomingEvent {
        routing_key: routing_key.clone(),
        body,
        redelivered,
    };

    let started = Instant::now();
    let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
    MessagingMetrics::handler_duration(&routing_key, started.elapsed());

    let disposition = match outcome {
        Ok(Ok(disposition)) => {
            stats.processed.fetch_add(1, Ordering::Relaxed);
            disposition
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            MessagingMetrics::handler_failed(&routing_key, "error");
            let disposition = on_failure(policy, redelivered);
            warn!(
                routing_key = %routing_key,
                redelivered,
                disposition = disposition.as_str(),
                error = %format!("{:#}", e),
                "Event handler failed"
            );
            disposition
        }
        Err(panic) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            MessagingMetrics::handler_failed(&routing_key, "panic");
            let disposition = on_failure(policy, redelivered);
            error!(
                routing_key = %routing_key,
                redelivered,
                disposition = disposition.as_str(),
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked"
            );
            disposition
        }
    };

    settle(delivery, disposition).await;
}

/// Disposition of a message whose handler errored or panicked.
fn on_failure(policy: HandlerFailurePolicy, redelivered: bool) -> Disposition {
    match policy {
        HandlerFailurePolicy::Ack => Disposition::Ack,
        HandlerFailurePolicy::RequeueOnce if !redelivered => Disposition::Requeue,
        HandlerFailurePolicy::RequeueOnce => Disposition::Ack,
    }
}

async fn settle(delivery: Delivery, disposition: Disposition) {
    let routing_key = delivery.routing_key.clone();
    let result = match disposition {
        Disposition::Ack => delivery.ack().await,
        Disposition::Requeue => delivery.nack(true).await,
        Disposition::Drop => delivery.nack(false).await,
    };

    match result {
        Ok(()) => {
            MessagingMetrics::event_consumed(&routing_key, disposition.as_str());
            debug!(routing_key = %routing_key, disposition = disposition.as_str(), "Delivery settled");
        }
        Err(e) => error!(routing_key = %routing_key, error = %e, "Failed to settle delivery"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryBroker;
    use agora_config::BrokerConfig;

    fn consumer(broker: &InMemoryBroker, policy: HandlerFailurePolicy) -> (Arc<ConnectionManager>, EventConsumer) {
        let connection = Arc::new(ConnectionManager::new(
            BrokerConfig {
                retry_delay_ms: 1,
                ..BrokerConfig::default()
            },
            Arc::new(broker.clone()),
        ));
        let consumer = EventConsumer::new(Arc::clone(&connection), policy);
        (connection, consumer)
    }

    #[test]
    fn test_failure_policy() {
        assert_eq!(on_failure(HandlerFailurePolicy::Ack, false), Disposition::Ack);
        assert_eq!(on_failure(HandlerFailurePolicy::RequeueOnce, false), Disposition::Requeue);
        assert_eq!(on_failure(HandlerFailurePolicy::RequeueOnce, true), Disposition::Ack);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        #[derive(serde::Deserialize)]
        struct Body {
            id: String,
        }

        let event = IncomingEvent {
            routing_key: "x".into(),
            body: serde_json::json!({"id": "a", "extra": true}),
            redelivered: false,
        };
        assert_eq!(event.decode::<Body>().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_each_subscription_gets_its_own_queue() {
        let broker = InMemoryBroker::new();
        let (_connection, consumer) = consumer(&broker, HandlerFailurePolicy::Ack);

        let first = consumer
            .subscribe("post.created", |_| async { Ok(Disposition::Ack) })
            .await
            .unwrap();
        let second = consumer
            .subscribe("post.deleted", |_| async { Ok(Disposition::Ack) })
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(broker.queue_count(), 2);

        let subs = consumer.subscriptions();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().all(|s| s.running));
    }

    #[tokio::test]
    async fn test_shutdown_stops_loops() {
        let broker = InMemoryBroker::new();
        let (_connection, consumer) = consumer(&broker, HandlerFailurePolicy::Ack);
        consumer
            .subscribe("post.created", |_| async { Ok(Disposition::Ack) })
            .await
            .unwrap();

        consumer.shutdown();

        assert!(consumer.subscriptions().is_empty());
    }
}
