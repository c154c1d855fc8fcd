//! Broker connection lifetime.

use crate::error::{MessagingError, MessagingResult};
use crate::metrics::MessagingMetrics;
use crate::transport::{AmqpTransport, BrokerChannel, BrokerTransport, ExchangeSpec};
use agora_config::BrokerConfig;
use agora_resilience::{with_timeout, RetryPolicy};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

type Session = Arc<OnceCell<Arc<dyn BrokerChannel>>>;

/// Owns the connection and channel shared by publishers and consumers.
///
/// The channel is opened on first use. Concurrent first callers wait on the
/// same connection attempt instead of racing to open their own. When the
/// channel is found closed, the next caller starts a fresh session.
pub struct ConnectionManager {
    config: BrokerConfig,
    transport: Arc<dyn BrokerTransport>,
    session: RwLock<Session>,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Creates a manager that connects through `transport`.
    pub fn new(config: BrokerConfig, transport: Arc<dyn BrokerTransport>) -> Self {
        Self {
            config,
            transport,
            session: RwLock::new(Arc::new(OnceCell::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a manager for an AMQP broker.
    pub fn amqp(config: BrokerConfig) -> Self {
        Self::new(config, Arc::new(AmqpTransport::new()))
    }

    /// Name of the shared exchange.
    pub fn exchange(&self) -> &str {
        &self.config.exchange
    }

    /// Broker settings this manager was built with.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Connects eagerly. Fails once every attempt allowed by the config failed.
    pub async fn connect(&self) -> MessagingResult<()> {
        self.channel().await.map(|_| ())
    }

    /// Returns the shared channel, connecting first if there is none.
    pub async fn channel(&self) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let mut session = Arc::clone(&*self.session.read());

        if session.get().is_some_and(|channel| !channel.is_open()) {
            warn!(exchange = %self.config.exchange, "Broker channel is closed, reconnecting");
            session = self.replace_session(&session);
        }

        let channel = session.get_or_try_init(|| self.establish()).await?;
        Ok(Arc::clone(channel))
    }

    /// Returns true if a channel is open.
    pub fn is_connected(&self) -> bool {
        self.session
            .read()
            .get()
            .is_some_and(|channel| channel.is_open())
    }

    /// True after [`close`](Self::close) until the next successful connect.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the channel and connection, if any.
    pub async fn close(&self) -> MessagingResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let session = std::mem::replace(&mut *self.session.write(), Arc::new(OnceCell::new()));

        if let Some(channel) = session.get() {
            channel.close().await?;
            info!(exchange = %self.config.exchange, "Broker connection closed");
        }
        Ok(())
    }

    fn replace_session(&self, stale: &Session) -> Session {
        let mut session = self.session.write();
        if Arc::ptr_eq(&session, stale) {
            *session = Arc::new(OnceCell::new());
        }
        Arc::clone(&session)
    }

    async fn establish(&self) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let max_attempts = self.config.max_attempts.max(1);
        let policy = RetryPolicy::fixed(max_attempts, self.config.retry_delay());
        let spec = ExchangeSpec::topic(&self.config.exchange, self.config.exchange_durable);

        info!(
            url = %redact_url(&self.config.url),
            exchange = %spec.name,
            max_attempts,
            "Connecting to broker"
        );

        let result = policy
            .execute_with_attempt(|attempt| {
                let spec = &spec;
                async move {
                    let outcome = with_timeout(self.config.attempt_timeout(), || self.open_and_declare(spec)).await;
                    MessagingMetrics::connect_attempt(outcome.is_ok());
                    if let Err(e) = &outcome {
                        warn!(
                            attempt,
                            max_attempts,
                            retry_delay_ms = self.config.retry_delay_ms,
                            error = %e,
                            "Broker connection attempt failed"
                        );
                    }
                    outcome
                }
            })
            .await;

        match result {
            Ok(channel) => {
                self.closed.store(false, Ordering::SeqCst);
                info!(exchange = %spec.name, "Connected to broker");
                Ok(channel)
            }
            Err(e) => {
                error!(attempts = max_attempts, error = %e, "Giving up on broker connection");
                Err(MessagingError::ConnectExhausted {
                    attempts: max_attempts,
                    last_error: e.to_string(),
                })
            }
        }
    }

    async fn open_and_declare(&self, spec: &ExchangeSpec) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let channel = self.transport.open(&self.config.url).await?;

        if let Err(e) = channel.declare_exchange(spec).await {
            if let Err(close_err) = channel.close().await {
                debug!(error = %close_err, "Failed to close channel after declare error");
            }
            return Err(e);
        }

        Ok(channel)
    }
}

/// Hides credentials in a broker URL.
pub fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{}://***@{}", scheme, host),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
