//! Broker transports.
//!
//! A transport opens a connection with exactly one logical channel. Everything
//! above this module talks to the broker through [`BrokerChannel`], so the
//! AMQP client and the in-process broker are interchangeable.

pub mod amqp;
pub mod memory;

pub use amqp::AmqpTransport;
pub use memory::{BrokerStats, InMemoryBroker};

use crate::error::MessagingResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// Stream of deliveries for one consumer.
pub type DeliveryStream = BoxStream<'static, MessagingResult<Delivery>>;

/// Settings an exchange is asserted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    /// Exchange name.
    pub name: String,
    /// Whether the exchange survives broker restarts.
    pub durable: bool,
}

impl ExchangeSpec {
    /// A topic exchange with the given name.
    pub fn topic(name: impl Into<String>, durable: bool) -> Self {
        Self {
            name: name.into(),
            durable,
        }
    }
}

/// Opens connections to a broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Connects to `url` and opens one channel on the new connection.
    async fn open(&self, url: &str) -> MessagingResult<Arc<dyn BrokerChannel>>;
}

/// One channel on an open broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declares a topic exchange. Redeclaring with identical settings succeeds.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> MessagingResult<()>;

    /// Routes `payload` to `exchange` under `routing_key` without awaiting a confirm.
    async fn publish(&self, exchange: &str, routing_key: &str, payload: Vec<u8>) -> MessagingResult<()>;

    /// Declares a server-named queue exclusive to this connection and returns its name.
    async fn declare_exclusive_queue(&self) -> MessagingResult<String>;

    /// Binds `queue` to `exchange` with a routing key pattern.
    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> MessagingResult<()>;

    /// Starts consuming `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream>;

    /// Returns true while both the channel and its connection are usable.
    fn is_open(&self) -> bool;

    /// Closes the channel and its connection. Exclusive queues go with it.
    async fn close(&self) -> MessagingResult<()>;
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Positive acknowledgement.
    async fn ack(&self) -> MessagingResult<()>;

    /// Negative acknowledgement, optionally putting the message back on its queue.
    async fn nack(&self, requeue: bool) -> MessagingResult<()>;
}

/// A message received from a queue, awaiting settlement.
pub struct Delivery {
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Raw message body.
    pub payload: Vec<u8>,
    /// True if the broker delivered this message before.
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Creates a delivery settled through `acker`.
    pub fn new(
        routing_key: impl Into<String>,
        payload: Vec<u8>,
        redelivered: bool,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload,
            redelivered,
            acker,
        }
    }

    /// Acknowledges the delivery.
    pub async fn ack(self) -> MessagingResult<()> {
        self.acker.ack().await
    }

    /// Rejects the delivery; with `requeue` the broker redelivers it.
    pub async fn nack(self, requeue: bool) -> MessagingResult<()> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}
