//! In-process pub/sub over `tokio::sync::broadcast`.
//!
//! Lets a proxy and its backends run in one process (demos, tests, or a
//! single-node deployment) with the same [`PubSub`] contract as the Redis
//! transport. Clones share the same topics, so one clone can play the
//! proxy and another the backend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::{MessageHandler, PubSub};

/// Per-topic buffer. A subscriber that falls further behind than this
/// skips the oldest messages and logs how many it missed.
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// In-memory broker shared by every clone of the handle.
#[derive(Clone)]
pub struct LocalBus {
    inner: Option<Arc<LocalInner>>,
}

struct LocalInner {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalBus {
    /// Creates a live bus with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates a live bus buffering up to `capacity` messages per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Some(Arc::new(LocalInner {
                topics: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            })),
        }
    }

    /// Creates a bus that is permanently unavailable.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    fn live(&self) -> Option<&Arc<LocalInner>> {
        self.inner
            .as_ref()
            .filter(|inner| !inner.closed.load(Ordering::Acquire))
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalInner {
    fn sender_for(&self, topic: &str) -> broadcast::Sender<String> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl PubSub for LocalBus {
    fn available(&self) -> bool {
        self.live().is_some()
    }

    fn publish(&self, channel: &str, payload: String) {
        let Some(inner) = self.live() else {
            tracing::trace!(channel, "local bus unavailable, publish skipped");
            return;
        };
        // An error only means nobody is subscribed yet.
        if inner.sender_for(channel).send(payload).is_err() {
            tracing::trace!(channel, "published with no subscribers");
        }
    }

    fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>) {
        let Some(inner) = self.live() else {
            tracing::debug!(channel, "local bus unavailable, subscribe skipped");
            return;
        };

        // Subscribe before spawning so nothing published after this call
        // returns can be missed.
        let mut rx = inner.sender_for(channel).subscribe();
        let mut shutdown = inner.shutdown.subscribe();
        let channel = channel.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    msg = rx.recv() => match msg {
                        Ok(payload) => handler.handle(&channel, &payload),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                %channel,
                                skipped,
                                "local subscriber lagged, messages dropped"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(%channel, "local subscriber stopped");
        });
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
            inner.topics.write().clear();
            tracing::debug!("local bus shut down");
        }
    }
}
