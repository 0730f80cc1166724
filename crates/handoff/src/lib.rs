//! # Handoff
//!
//! Save-before-switch coordination for players moving between game-server
//! processes behind a routing proxy.
//!
//! When a proxy moves a player from server A to server B, B must not load
//! the player before A has saved them, or B can later overwrite A's newer
//! save. Handoff puts a gate in front of every switch:
//!
//! 1. deny the switch and publish a save request for the player;
//! 2. wait (bounded, 2 s by default) for A's acknowledgement;
//! 3. grant a one-shot bypass token and replay the switch.
//!
//! The pieces:
//!
//! - [`SessionCoordinator`]: the gate ([`RoutingGate`])
//! - [`HandoffProxy`]: composition root, owns bookkeeping, supports reload
//! - [`SaveAckHandler`] / [`SaveRequestResponder`]: the two ends of the
//!   save round-trip
//! - [`SaveBarrier`]: fallback for frameworks that cannot deny a switch
//! - [`BroadcastRelay`] / [`BroadcastPublisher`]: cross-server messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handoff::prelude::*;
//!
//! struct ProxyReconnector;
//!
//! impl Reconnector for ProxyReconnector {
//!     async fn connect(&self, _id: EntityId, _target: &ServerId) -> ReconnectResult {
//!         // Ask the proxy framework to connect the player.
//!         ReconnectResult { success: true }
//!     }
//! }
//!
//! # async fn run() -> Result<(), HandoffError> {
//! let config = HandoffConfig::load("handoff.toml")?;
//! let proxy = HandoffProxy::connect(&config, ProxyReconnector).await?;
//!
//! let mut event = RoutingEvent::new(
//!     EntityId::random(),
//!     Some(ServerId::from("lobby")),
//!     Some(ServerId::from("dungeon")),
//! );
//! proxy.handle(&mut event);
//! # Ok(())
//! # }
//! ```

mod barrier;
mod config;
mod coordinator;
mod error;
mod handlers;
mod proxy;
mod routing;
pub mod telemetry;

pub use barrier::SaveBarrier;
pub use config::{ChannelConfig, ConfigError, DEFAULT_ACK_TIMEOUT_MS, HandoffConfig};
pub use coordinator::{HandoffReport, SessionCoordinator};
pub use error::HandoffError;
pub use handlers::{
    BroadcastPublisher, BroadcastRelay, BroadcastSink, PlayerSaver,
    SaveAckHandler, SaveRequestResponder,
};
pub use proxy::HandoffProxy;
pub use routing::{
    Decision, GateOutcome, ReconnectResult, Reconnector, RoutingEvent,
    RoutingGate,
};

pub use handoff_protocol as protocol;
pub use handoff_session as session;
pub use handoff_transport as transport;

/// Everything a proxy or backend integration usually needs.
pub mod prelude {
    pub use crate::{
        BroadcastPublisher, BroadcastRelay, BroadcastSink, Decision,
        GateOutcome, HandoffConfig, HandoffError, HandoffProxy,
        HandoffReport, PlayerSaver, ReconnectResult, Reconnector,
        RoutingEvent, RoutingGate, SaveAckHandler, SaveBarrier,
        SaveRequestResponder, SessionCoordinator,
    };
    pub use handoff_protocol::{BroadcastMessage, EntityId, ServerId};
    pub use handoff_session::{
        Confirmation, PendingConfirmations, SafeTransferTokens,
    };
    #[cfg(feature = "redis")]
    pub use handoff_transport::RedisPubSub;
    pub use handoff_transport::{
        LocalBus, MessageHandler, PubSub, TransportConfig,
    };
}
