//! Redis pub/sub transport using the `redis` crate.
//!
//! Two kinds of connection are used:
//!
//! - one multiplexed [`ConnectionManager`] for publishing, drained by a
//!   single publisher task so publishes keep their call order;
//! - one dedicated pub/sub connection per subscription, owned by that
//!   subscription's loop and re-established with [`Backoff`] whenever the
//!   message stream ends or errors.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{
    Backoff, MessageHandler, PubSub, TransportConfig, TransportError,
};

/// A message waiting in the publisher queue.
struct Outbound {
    channel: String,
    payload: String,
}

/// A [`PubSub`] backed by a Redis server.
///
/// Build one with [`connect`](Self::connect) when a broken broker should
/// fail startup, or [`connect_or_disabled`](Self::connect_or_disabled) to
/// keep running in degraded mode.
pub struct RedisPubSub {
    inner: Option<Arc<RedisInner>>,
}

struct RedisInner {
    client: redis::Client,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RedisPubSub {
    /// Returns a transport that is permanently unavailable.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Connects to the broker described by `config`.
    ///
    /// # Errors
    /// - [`TransportError::Disabled`]: `config.enabled` is `false`
    /// - [`TransportError::InvalidConfig`]: bad host, port or URL
    /// - [`TransportError::ConnectTimeout`]: no answer within
    ///   `connect_timeout_ms`
    /// - [`TransportError::Connect`]: the broker refused or failed
    pub async fn connect(
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        if !config.enabled {
            return Err(TransportError::Disabled);
        }
        config.validate()?;

        let client = redis::Client::open(config.url())
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        let timeout = config.connect_timeout();
        let conn = tokio::time::timeout(
            timeout,
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout(timeout))?
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (outbound, rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let publisher =
            tokio::spawn(run_publisher(conn, rx, shutdown.subscribe()));

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = config.use_ssl,
            "connected to redis"
        );

        Ok(Self {
            inner: Some(Arc::new(RedisInner {
                client,
                outbound,
                closed: AtomicBool::new(false),
                shutdown,
                tasks: Mutex::new(vec![publisher]),
            })),
        })
    }

    /// Connects, or falls back to [`disabled()`](Self::disabled).
    ///
    /// Never fails: an unreachable broker is logged and the process keeps
    /// running with hand-off gating switched off.
    pub async fn connect_or_disabled(config: &TransportConfig) -> Self {
        match Self::connect(config).await {
            Ok(transport) => transport,
            Err(TransportError::Disabled) => {
                tracing::info!("redis transport disabled by configuration");
                Self::disabled()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    host = %config.host,
                    port = config.port,
                    "redis unavailable, continuing without transport"
                );
                Self::disabled()
            }
        }
    }

    fn live(&self) -> Option<&Arc<RedisInner>> {
        self.inner
            .as_ref()
            .filter(|inner| !inner.closed.load(Ordering::Acquire))
    }
}

impl PubSub for RedisPubSub {
    fn available(&self) -> bool {
        self.live().is_some()
    }

    fn publish(&self, channel: &str, payload: String) {
        let Some(inner) = self.live() else {
            tracing::trace!(channel, "redis unavailable, publish skipped");
            return;
        };
        let msg = Outbound {
            channel: channel.to_string(),
            payload,
        };
        if inner.outbound.send(msg).is_err() {
            tracing::warn!(channel, "publisher stopped, message dropped");
        }
    }

    fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>) {
        let Some(inner) = self.live() else {
            tracing::debug!(channel, "redis unavailable, subscribe skipped");
            return;
        };
        let task = tokio::spawn(run_subscriber(
            inner.client.clone(),
            channel.to_string(),
            handler,
            inner.shutdown.subscribe(),
        ));
        inner.tasks.lock().push(task);
    }

    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        let inner = self.inner.clone();
        async move {
            let Some(inner) = inner else { return };
            if inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            let _ = inner.shutdown.send(true);
            let tasks: Vec<_> = inner.tasks.lock().drain(..).collect();
            for task in tasks {
                let _ = task.await;
            }
            tracing::info!("redis transport shut down");
        }
    }
}

/// Drains the outbound queue into Redis, one `PUBLISH` at a time.
async fn run_publisher(
    mut conn: ConnectionManager,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let result: redis::RedisResult<()> =
            conn.publish(msg.channel.as_str(), msg.payload.as_str()).await;
        match result {
            Ok(()) => {
                tracing::trace!(channel = %msg.channel, "published");
            }
            Err(e) => {
                let err = TransportError::Publish(e.to_string());
                tracing::warn!(
                    channel = %msg.channel,
                    error = %err,
                    "message dropped"
                );
            }
        }
    }
    tracing::debug!("redis publisher stopped");
}

/// Keeps one channel subscribed until shutdown, reconnecting on failure.
async fn run_subscriber(
    client: redis::Client,
    channel: String,
    handler: Arc<dyn MessageHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            result = consume(&client, &channel, handler.as_ref(), &mut backoff) => {
                match result {
                    Ok(()) => tracing::warn!(
                        %channel,
                        "redis subscription stream ended"
                    ),
                    Err(e) => tracing::warn!(
                        %channel,
                        error = %e,
                        "redis subscription failed"
                    ),
                }
            }
        }

        let delay = backoff.next_delay();
        tracing::debug!(%channel, ?delay, "resubscribing after delay");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    tracing::debug!(%channel, "redis subscriber stopped");
}

/// Subscribes and feeds messages to `handler` until the stream ends.
async fn consume(
    client: &redis::Client,
    channel: &str,
    handler: &dyn MessageHandler,
    backoff: &mut Backoff,
) -> Result<(), TransportError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| TransportError::Subscribe(e.to_string()))?;
    pubsub
        .subscribe(channel)
        .await
        .map_err(|e| TransportError::Subscribe(e.to_string()))?;

    backoff.reset();
    tracing::info!(channel, "subscribed");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        match msg.get_payload::<String>() {
            Ok(payload) => handler.handle(channel, &payload),
            Err(e) => tracing::warn!(
                channel,
                error = %e,
                "dropping non-text payload"
            ),
        }
    }
    Ok(())
}
