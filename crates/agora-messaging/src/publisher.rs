//! Event publisher.

use crate::connection::ConnectionManager;
use crate::error::MessagingResult;
use crate::metrics::MessagingMetrics;
use agora_core::DomainEvent;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes JSON bodies to the shared exchange.
///
/// Publishing is fire-and-forget: no broker confirm is awaited, so a message
/// routed to no queue is silently discarded by the broker. The connection is
/// opened on the first publish if nothing opened it before.
#[derive(Clone)]
pub struct EventPublisher {
    connection: Arc<ConnectionManager>,
}

impl EventPublisher {
    /// Creates a publisher on a shared connection.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Serializes `body` to JSON and routes it under `routing_key`.
    pub async fn publish<T>(&self, routing_key: &str, body: &T) -> MessagingResult<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        let bytes = payload.len();

        let channel = self.connection.channel().await?;
        channel
            .publish(self.connection.exchange(), routing_key, payload)
            .await?;

        MessagingMetrics::event_published(routing_key);
        debug!(
            exchange = %self.connection.exchange(),
            routing_key,
            bytes,
            "Event published"
        );
        Ok(())
    }

    /// Publishes a domain event under its own routing key.
    pub async fn publish_event<E: DomainEvent>(&self, event: &E) -> MessagingResult<()> {
        self.publish(E::ROUTING_KEY, event).await?;
        info!(
            routing_key = E::ROUTING_KEY,
            aggregate_id = %event.aggregate_id(),
            "Domain event published"
        );
        Ok(())
    }
}
