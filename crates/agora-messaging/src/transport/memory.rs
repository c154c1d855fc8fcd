//! In-process broker with topic-exchange semantics.
//!
//! Queues are exclusive to the connection that declared them and disappear when
//! it closes; messages routed to no queue are discarded. Connection failures
//! can be injected to exercise the reconnect path.

use super::{Acknowledger, BrokerChannel, BrokerTransport, Delivery, DeliveryStream, ExchangeSpec};
use crate::error::{MessagingError, MessagingResult};
use crate::topic;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Counters describing broker traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Messages accepted by an exchange.
    pub published: u64,
    /// Copies placed on queues.
    pub routed: u64,
    /// Positive acknowledgements.
    pub acked: u64,
    /// Negative acknowledgements with requeue.
    pub requeued: u64,
    /// Negative acknowledgements without requeue.
    pub rejected: u64,
}

#[derive(Debug, Clone)]
struct Envelope {
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

struct QueueState {
    owner: u64,
    bindings: Vec<(String, String)>,
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Option<mpsc::UnboundedReceiver<Envelope>>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: Mutex<HashMap<String, ExchangeSpec>>,
    queues: Mutex<HashMap<String, QueueState>>,
    connections: Mutex<Vec<Arc<ConnectionState>>>,
    next_id: AtomicU64,
    fail_next: AtomicU32,
    connect_attempts: AtomicU32,
    published: AtomicU64,
    routed: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
    rejected: AtomicU64,
}

struct ConnectionState {
    id: u64,
    open: AtomicBool,
}

impl BrokerState {
    fn drop_connection(&self, id: u64) {
        self.queues.lock().retain(|_, queue| queue.owner != id);
        self.connections.lock().retain(|conn| conn.id != id);
    }

    fn enqueue(&self, queue: &str, envelope: Envelope) -> bool {
        self.queues
            .lock()
            .get(queue)
            .is_some_and(|state| state.sender.send(envelope).is_ok())
    }
}

/// Broker that lives inside the process.
///
/// Cloning yields another handle to the same broker, so one instance can serve
/// every connection in a test.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts seen so far, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of open connections.
    pub fn open_connections(&self) -> usize {
        self.state.connections.lock().len()
    }

    /// Number of live queues.
    pub fn queue_count(&self) -> usize {
        self.state.queues.lock().len()
    }

    /// Returns the declared settings of an exchange.
    pub fn exchange(&self, name: &str) -> Option<ExchangeSpec> {
        self.state.exchanges.lock().get(name).cloned()
    }

    /// Drops every connection as if the broker restarted. Exchanges survive.
    pub fn disconnect_all(&self) {
        let connections: Vec<Arc<ConnectionState>> = self.state.connections.lock().drain(..).collect();
        for conn in &connections {
            conn.open.store(false, Ordering::SeqCst);
        }
        self.state.queues.lock().clear();
        debug!(count = connections.len(), "In-memory broker dropped all connections");
    }

    /// Returns traffic counters.
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.state.published.load(Ordering::SeqCst),
            routed: self.state.routed.load(Ordering::SeqCst),
            acked: self.state.acked.load(Ordering::SeqCst),
            requeued: self.state.requeued.load(Ordering::SeqCst),
            rejected: self.state.rejected.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn open(&self, url: &str) -> MessagingResult<Arc<dyn BrokerChannel>> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .state
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(MessagingError::Connection(format!("connection refused: {}", url)));
        }

        let conn = Arc::new(ConnectionState {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            open: AtomicBool::new(true),
        });
        self.state.connections.lock().push(Arc::clone(&conn));

        Ok(Arc::new(MemoryChannel {
            broker: Arc::clone(&self.state),
            conn,
        }))
    }
}

struct MemoryChannel {
    broker: Arc<BrokerState>,
    conn: Arc<ConnectionState>,
}

impl MemoryChannel {
    fn ensure_open(&self) -> MessagingResult<()> {
        if self.conn.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MessagingError::Closed)
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> MessagingResult<()> {
        self.ensure_open()?;
        let mut exchanges = self.broker.exchanges.lock();
        match exchanges.get(&spec.name) {
            Some(existing) if existing != spec => Err(MessagingError::Exchange {
                exchange: spec.name.clone(),
                reason: format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' (declared {}, requested {})",
                    existing.durable, spec.durable
                ),
            }),
            Some(_) => Ok(()),
            None => {
                exchanges.insert(spec.name.clone(), spec.clone());
                Ok(())
            }
        }
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: Vec<u8>) -> MessagingResult<()> {
        self.ensure_open()?;
        if !self.broker.exchanges.lock().contains_key(exchange) {
            return Err(MessagingError::Channel(format!("NOT_FOUND - no exchange '{}'", exchange)));
        }
        self.broker.published.fetch_add(1, Ordering::SeqCst);

        let queues = self.broker.queues.lock();
        for state in queues.values() {
            let bound = state
                .bindings
                .iter()
                .any(|(ex, pattern)| ex == exchange && topic::matches(pattern, routing_key));
            if bound {
                let envelope = Envelope {
                    routing_key: routing_key.to_string(),
                    payload: payload.clone(),
                    redelivered: false,
                };
                if state.sender.send(envelope).is_ok() {
                    self.broker.routed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    async fn declare_exclusive_queue(&self) -> MessagingResult<String> {
        self.ensure_open()?;
        let name = format!("amq.gen-{}", uuid::Uuid::new_v4().simple());
        let (sender, receiver) = mpsc::unbounded_channel();
        self.broker.queues.lock().insert(
            name.clone(),
            QueueState {
                owner: self.conn.id,
                bindings: Vec::new(),
                sender,
                receiver: Some(receiver),
            },
        );
        Ok(name)
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> MessagingResult<()> {
        self.ensure_open()?;
        if !self.broker.exchanges.lock().contains_key(exchange) {
            return Err(MessagingError::Channel(format!("NOT_FOUND - no exchange '{}'", exchange)));
        }
        let mut queues = self.broker.queues.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::Channel(format!("NOT_FOUND - no queue '{}'", queue)))?;
        let binding = (exchange.to_string(), routing_key.to_string());
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream> {
        self.ensure_open()?;
        let receiver = {
            let mut queues = self.broker.queues.lock();
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| MessagingError::Channel(format!("NOT_FOUND - no queue '{}'", queue)))?;
            state.receiver.take().ok_or_else(|| {
                MessagingError::Channel(format!("ACCESS_REFUSED - queue '{}' already has a consumer", queue))
            })?
        };
        debug!(queue, consumer_tag, "In-memory consumer started");

        let broker = Arc::downgrade(&self.broker);
        let queue = queue.to_string();
        let deliveries = futures::stream::unfold(receiver, move |mut receiver| {
            let broker = broker.clone();
            let queue = queue.clone();
            async move {
                let envelope = receiver.recv().await?;
                let delivery = Delivery::new(
                    envelope.routing_key.clone(),
                    envelope.payload.clone(),
                    envelope.redelivered,
                    Box::new(MemoryAcker {
                        broker,
                        queue,
                        envelope,
                    }),
                );
                Some((Ok(delivery), receiver))
            }
        });

        Ok(deliveries.boxed())
    }

    fn is_open(&self) -> bool {
        self.conn.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> MessagingResult<()> {
        if self.conn.open.swap(false, Ordering::SeqCst) {
            self.broker.drop_connection(self.conn.id);
            debug!(connection_id = self.conn.id, "In-memory connection closed");
        }
        Ok(())
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        if self.conn.open.swap(false, Ordering::SeqCst) {
            self.broker.drop_connection(self.conn.id);
        }
    }
}

struct MemoryAcker {
    broker: Weak<BrokerState>,
    queue: String,
    envelope: Envelope,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> MessagingResult<()> {
        let broker = self.broker.upgrade().ok_or(MessagingError::Closed)?;
        broker.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> MessagingResult<()> {
        let broker = self.broker.upgrade().ok_or(MessagingError::Closed)?;
        if requeue {
            broker.requeued.fetch_add(1, Ordering::SeqCst);
            let envelope = Envelope {
                redelivered: true,
                ..self.envelope.clone()
            };
            if !broker.enqueue(&self.queue, envelope) {
                debug!(queue = %self.queue, "Requeue target is gone; message discarded");
            }
        } else {
            broker.rejected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
