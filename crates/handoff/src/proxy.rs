//! Composition root for a hand-off proxy.
//!
//! [`HandoffProxy`] owns everything one proxy process needs: the shared
//! bookkeeping, the current transport, and the coordinator built over
//! them. It is constructed explicitly and passed to whatever dispatches
//! routing events; nothing lives in a static.
//!
//! Reloading swaps the transport and coordinator but keeps the pending
//! confirmations and tokens, so a reload in the middle of a hand-off
//! neither strands a waiting player nor forgets a granted bypass.

use std::sync::Arc;

use handoff_session::{PendingConfirmations, SafeTransferTokens};
use handoff_transport::PubSub;
#[cfg(feature = "redis")]
use handoff_transport::RedisPubSub;
use parking_lot::RwLock;

use crate::{
    GateOutcome, HandoffConfig, HandoffError, Reconnector, RoutingEvent,
    RoutingGate, SaveAckHandler, SessionCoordinator,
};

/// A running hand-off proxy.
pub struct HandoffProxy<P: PubSub, R: Reconnector> {
    pending: PendingConfirmations,
    tokens: SafeTransferTokens,
    reconnector: Arc<R>,
    current: RwLock<Arc<SessionCoordinator<P, R>>>,
}

impl<P: PubSub, R: Reconnector> HandoffProxy<P, R> {
    /// Wires a proxy over `transport` and subscribes to acknowledgements.
    ///
    /// Must be called inside a Tokio runtime (subscribing spawns tasks).
    ///
    /// # Errors
    /// Returns [`HandoffError::Config`] if `config` is invalid.
    pub fn start(
        transport: P,
        reconnector: R,
        config: &HandoffConfig,
    ) -> Result<Self, HandoffError> {
        config.validate()?;

        let pending = PendingConfirmations::new();
        let tokens = SafeTransferTokens::new();
        let reconnector = Arc::new(reconnector);
        let coordinator = build_coordinator(
            transport,
            &pending,
            &tokens,
            &reconnector,
            config,
        );

        tracing::info!(
            transport_available = coordinator.transport().available(),
            ack_timeout_ms = config.ack_timeout_ms,
            "hand-off proxy started"
        );

        Ok(Self {
            pending,
            tokens,
            reconnector,
            current: RwLock::new(coordinator),
        })
    }

    /// The coordinator currently handling routing events.
    pub fn coordinator(&self) -> Arc<SessionCoordinator<P, R>> {
        self.current.read().clone()
    }

    /// The transport currently in use.
    pub fn transport(&self) -> Arc<P> {
        Arc::clone(self.current.read().transport())
    }

    /// The pending-confirmation table (survives reloads).
    pub fn pending(&self) -> &PendingConfirmations {
        &self.pending
    }

    /// The safe-transfer tokens (survive reloads).
    pub fn tokens(&self) -> &SafeTransferTokens {
        &self.tokens
    }

    /// Replaces the transport and settings, then shuts the old transport
    /// down.
    ///
    /// # Errors
    /// Returns [`HandoffError::Config`] if `config` is invalid; the
    /// running proxy is left untouched in that case.
    pub async fn reload_with(
        &self,
        transport: P,
        config: &HandoffConfig,
    ) -> Result<(), HandoffError> {
        config.validate()?;

        let coordinator = build_coordinator(
            transport,
            &self.pending,
            &self.tokens,
            &self.reconnector,
            config,
        );
        let available = coordinator.transport().available();
        let previous = std::mem::replace(&mut *self.current.write(), coordinator);
        previous.transport().shutdown().await;

        tracing::info!(
            transport_available = available,
            ack_timeout_ms = config.ack_timeout_ms,
            "hand-off configuration reloaded"
        );
        Ok(())
    }

    /// Stops the current transport. Idempotent.
    pub async fn shutdown(&self) {
        self.transport().shutdown().await;
        tracing::info!("hand-off proxy stopped");
    }
}

#[cfg(feature = "redis")]
impl<R: Reconnector> HandoffProxy<RedisPubSub, R> {
    /// Connects to Redis (or degrades) and starts the proxy.
    ///
    /// # Errors
    /// Returns [`HandoffError::Config`] if `config` is invalid. An
    /// unreachable broker is not an error.
    pub async fn connect(
        config: &HandoffConfig,
        reconnector: R,
    ) -> Result<Self, HandoffError> {
        config.validate()?;
        let transport = RedisPubSub::connect_or_disabled(&config.transport).await;
        Self::start(transport, reconnector, config)
    }

    /// Reconnects to Redis using a freshly loaded configuration.
    pub async fn reload(&self, config: &HandoffConfig) -> Result<(), HandoffError> {
        config.validate()?;
        let transport = RedisPubSub::connect_or_disabled(&config.transport).await;
        self.reload_with(transport, config).await
    }
}

impl<P: PubSub, R: Reconnector> RoutingGate for HandoffProxy<P, R> {
    fn handle(&self, event: &mut RoutingEvent) -> GateOutcome {
        self.coordinator().handle(event)
    }
}

fn build_coordinator<P: PubSub, R: Reconnector>(
    transport: P,
    pending: &PendingConfirmations,
    tokens: &SafeTransferTokens,
    reconnector: &Arc<R>,
    config: &HandoffConfig,
) -> Arc<SessionCoordinator<P, R>> {
    let transport = Arc::new(transport);
    if transport.available() {
        transport.subscribe(
            &config.channels.save_ack,
            Arc::new(SaveAckHandler::new(pending.clone())),
        );
    }
    Arc::new(SessionCoordinator::new(
        transport,
        pending.clone(),
        tokens.clone(),
        Arc::clone(reconnector),
        config,
    ))
}
