//! # Agora Messaging
//!
//! Publish/subscribe over a single topic exchange.
//!
//! ## Features
//!
//! - **Connection manager**: lazily opened, shared channel with bounded,
//!   fixed-delay reconnect and a per-attempt timeout
//! - **Publisher**: fire-and-forget JSON events routed by key
//! - **Consumer**: one exclusive queue and one task per subscription,
//!   explicit ack/requeue/drop dispositions, panic isolation
//! - **Transports**: AMQP via `lapin`, plus an in-process broker
//!
//! ## Example
//!
//! ```rust,ignore
//! use agora_messaging::{ConnectionManager, EventConsumer, EventPublisher, Disposition};
//!
//! let connection = Arc::new(ConnectionManager::amqp(config.broker.clone()));
//! connection.connect().await?;
//!
//! let consumer = EventConsumer::new(connection.clone(), config.broker.on_handler_error);
//! consumer
//!     .subscribe_event(|event: PostCreated| async move {
//!         index.upsert(event.into()).await?;
//!         Ok(Disposition::Ack)
//!     })
//!     .await?;
//!
//! EventPublisher::new(connection).publish_event(&post_created).await?;
//! ```

pub mod connection;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod publisher;
pub mod topic;
pub mod transport;

pub use connection::{redact_url, ConnectionManager};
pub use consumer::{Disposition, EventConsumer, EventHandler, HandlerResult, IncomingEvent, SubscriptionInfo};
pub use error::{MessagingError, MessagingResult};
pub use metrics::{register_metrics, MessagingMetrics};
pub use publisher::EventPublisher;
pub use transport::{AmqpTransport, BrokerChannel, BrokerTransport, Delivery, ExchangeSpec, InMemoryBroker};
