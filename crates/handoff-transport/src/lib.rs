//! Publish/subscribe transport layer for Handoff.
//!
//! Provides the [`PubSub`] and [`MessageHandler`] traits that abstract over
//! the message broker the proxy and backend processes share.
//!
//! The contract is deliberately forgiving: publishing is fire-and-forget,
//! subscribing spawns a background loop that survives broker hiccups, and a
//! transport that could not connect keeps working as a no-op that reports
//! [`available()`](PubSub::available) as `false`. Callers decide what
//! "unavailable" means for them; they never see a network error.
//!
//! # Feature Flags
//!
//! - `redis` (default): Redis pub/sub via the `redis` crate
//! - `tls`: `rediss://` support for [`TransportConfig::use_ssl`]

#![allow(async_fn_in_trait)]

mod backoff;
mod config;
mod error;
mod local;
#[cfg(feature = "redis")]
mod redis_pubsub;

pub use backoff::Backoff;
pub use config::TransportConfig;
pub use error::TransportError;
pub use local::LocalBus;
#[cfg(feature = "redis")]
pub use redis_pubsub::RedisPubSub;

use std::future::Future;
use std::sync::Arc;

/// Receives messages delivered on a subscribed channel.
///
/// Called on the transport's subscriber task, one message at a time and in
/// the order the broker produced them. Implementations must return quickly:
/// while `handle` runs, the next message on the channel (possibly the very
/// acknowledgement someone is waiting for) cannot be delivered.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one payload received on `channel`.
    fn handle(&self, channel: &str, payload: &str);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    fn handle(&self, channel: &str, payload: &str) {
        self(channel, payload)
    }
}

/// A connection to a publish/subscribe broker.
pub trait PubSub: Send + Sync + 'static {
    /// Returns `true` when backed by a live broker.
    ///
    /// `false` means the transport is disabled, never connected, or has
    /// been shut down. In that state every other method is a no-op.
    fn available(&self) -> bool;

    /// Queues `payload` for delivery on `channel` and returns immediately.
    ///
    /// Delivery is best effort. Messages published through one handle
    /// reach the broker in call order.
    fn publish(&self, channel: &str, payload: String);

    /// Starts a background loop delivering `channel` messages to `handler`.
    fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>);

    /// Stops all subscriber loops and releases connections.
    ///
    /// Idempotent: calling it again (or on an unavailable transport) does
    /// nothing.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}
