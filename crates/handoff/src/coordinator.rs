//! The save-before-switch gate.
//!
//! For every server switch the coordinator walks one attempt through:
//!
//! ```text
//! GATE_CHECK ──(token present)──────────────────────────→ ALLOWED
//!     │
//!     └─(no token)→ deny + publish save request → AWAITING_ACK
//!                                                    │
//!                        (ack or timeout) ←──────────┘
//!                               ▼
//!                    RESOLVED: mark token → RECONNECT_ISSUED
//! ```
//!
//! The re-issued connection comes back through the gate as a new routing
//! event, finds the token, and is allowed. A timeout is treated exactly
//! like an acknowledgement apart from a warning: a player is never held
//! longer than the configured bound.
//!
//! A second switch for the same player while the first is still held
//! supersedes it. The older attempt ends without a token or a reconnect;
//! only the newest target is ever replayed.

use std::sync::Arc;
use std::time::Duration;

use handoff_protocol::{EntityId, ServerId, encode_entity};
use handoff_session::{Confirmation, PendingConfirmations, PendingWait, SafeTransferTokens};
use handoff_transport::PubSub;
use tokio::runtime::Handle;

use crate::{
    Decision, GateOutcome, HandoffConfig, Reconnector, RoutingEvent,
    RoutingGate,
};

/// How one held switch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffReport {
    pub entity_id: EntityId,
    pub target: ServerId,
    /// How the wait for the save ended.
    pub confirmation: Confirmation,
    /// Whether the re-issued connection succeeded.
    pub reconnected: bool,
}

/// Proxy-side gate that holds server switches until the source server
/// has saved the player.
///
/// Shares its [`PendingConfirmations`] with the
/// [`SaveAckHandler`](crate::SaveAckHandler) subscribed to the ack channel.
pub struct SessionCoordinator<P: PubSub, R: Reconnector> {
    transport: Arc<P>,
    pending: PendingConfirmations,
    tokens: SafeTransferTokens,
    reconnector: Arc<R>,
    save_request_channel: String,
    ack_timeout: Duration,
    runtime: Handle,
}

impl<P: PubSub, R: Reconnector> SessionCoordinator<P, R> {
    /// Creates a coordinator over shared bookkeeping.
    ///
    /// Hand-off tasks are spawned on the runtime current at construction,
    /// so [`handle`](RoutingGate::handle) may be called from any thread.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        transport: Arc<P>,
        pending: PendingConfirmations,
        tokens: SafeTransferTokens,
        reconnector: Arc<R>,
        config: &HandoffConfig,
    ) -> Self {
        Self {
            transport,
            pending,
            tokens,
            reconnector,
            save_request_channel: config.channels.save_request.clone(),
            ack_timeout: config.ack_timeout(),
            runtime: Handle::current(),
        }
    }

    /// The transport this coordinator publishes on.
    pub fn transport(&self) -> &Arc<P> {
        &self.transport
    }

    /// The pending-confirmation table.
    pub fn pending(&self) -> &PendingConfirmations {
        &self.pending
    }

    /// The safe-transfer token set.
    pub fn tokens(&self) -> &SafeTransferTokens {
        &self.tokens
    }

    /// How long a switch is held at most.
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }
}

impl<P: PubSub, R: Reconnector> RoutingGate for SessionCoordinator<P, R> {
    fn handle(&self, event: &mut RoutingEvent) -> GateOutcome {
        let Some(target) = event.switch_target().cloned() else {
            return GateOutcome::PassThrough;
        };
        let entity_id = event.entity_id;

        if !self.transport.available() {
            tracing::debug!(
                %entity_id,
                %target,
                "transport unavailable, switch not gated"
            );
            return GateOutcome::TransportUnavailable;
        }

        if self.tokens.consume_if_present(entity_id) {
            tracing::debug!(%entity_id, %target, "safe token consumed, switch allowed");
            return GateOutcome::Allowed;
        }

        event.decision = Decision::Deny;

        // Register before publishing so even an instant ack finds a waiter.
        let wait = self.pending.register(entity_id, self.ack_timeout);
        self.transport
            .publish(&self.save_request_channel, encode_entity(&entity_id));

        tracing::info!(
            %entity_id,
            from = ?event.previous_server.as_ref().map(ServerId::as_str),
            to = %target,
            "switch held until source server saves"
        );

        let task = self.runtime.spawn(complete_handoff(
            wait,
            self.tokens.clone(),
            Arc::clone(&self.reconnector),
            target,
            self.ack_timeout,
        ));
        GateOutcome::Deferred(task)
    }
}

/// Waits for the save, grants the bypass token, and replays the switch.
async fn complete_handoff<R: Reconnector>(
    wait: PendingWait,
    tokens: SafeTransferTokens,
    reconnector: Arc<R>,
    target: ServerId,
    ack_timeout: Duration,
) -> HandoffReport {
    let entity_id = wait.entity_id();
    let confirmation = wait.wait().await;

    match confirmation {
        Confirmation::Confirmed => {
            tracing::debug!(%entity_id, "source server confirmed save");
        }
        Confirmation::TimedOut => {
            tracing::warn!(
                %entity_id,
                timeout_ms = ack_timeout.as_millis() as u64,
                "no save acknowledgement before timeout, switching anyway"
            );
        }
        Confirmation::Superseded => {
            // The newer attempt owns the token and the reconnect.
            tracing::debug!(
                %entity_id,
                %target,
                "hand-off superseded by a newer switch"
            );
            return HandoffReport {
                entity_id,
                target,
                confirmation,
                reconnected: false,
            };
        }
    }

    tokens.mark(entity_id);

    let result = reconnector.connect(entity_id, &target).await;
    if result.success {
        tracing::info!(%entity_id, %target, "switch replayed");
    } else {
        tracing::warn!(
            %entity_id,
            %target,
            "replayed switch failed, player stays on source server"
        );
    }

    HandoffReport {
        entity_id,
        target,
        confirmation,
        reconnected: result.success,
    }
}
