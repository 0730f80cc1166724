//! Save barrier for proxies that cannot deny a switch.
//!
//! Some routing frameworks only report a switch after they have decided
//! it, so there is nothing to hold and nothing to replay. The best such a
//! proxy can do is ask the source server to save and stall the switch
//! handler for the same bounded time the gate would. The save then races
//! the destination's load, which the gate avoids; this is the fallback,
//! not the default.

use std::sync::Arc;
use std::time::Duration;

use handoff_protocol::{EntityId, encode_entity};
use handoff_session::{Confirmation, PendingConfirmations};
use handoff_transport::PubSub;

use crate::HandoffConfig;

/// Publishes a save request and waits (bounded) for the acknowledgement.
///
/// No safe-transfer tokens are involved.
pub struct SaveBarrier<P: PubSub> {
    transport: Arc<P>,
    pending: PendingConfirmations,
    save_request_channel: String,
    ack_timeout: Duration,
}

impl<P: PubSub> SaveBarrier<P> {
    /// Creates a barrier. `pending` must be the table the
    /// [`SaveAckHandler`](crate::SaveAckHandler) resolves.
    pub fn new(
        transport: Arc<P>,
        pending: PendingConfirmations,
        config: &HandoffConfig,
    ) -> Self {
        Self {
            transport,
            pending,
            save_request_channel: config.channels.save_request.clone(),
            ack_timeout: config.ack_timeout(),
        }
    }

    /// Asks the source server to save `entity_id` and waits for it.
    ///
    /// Returns `None` without publishing when the transport is
    /// unavailable. Otherwise returns how the wait ended; the caller
    /// proceeds with the switch either way.
    pub async fn on_server_switch(
        &self,
        entity_id: EntityId,
    ) -> Option<Confirmation> {
        if !self.transport.available() {
            tracing::debug!(%entity_id, "transport unavailable, no save barrier");
            return None;
        }

        let wait = self.pending.register(entity_id, self.ack_timeout);
        self.transport
            .publish(&self.save_request_channel, encode_entity(&entity_id));

        let confirmation = wait.wait().await;
        if confirmation == Confirmation::TimedOut {
            tracing::warn!(
                %entity_id,
                timeout_ms = self.ack_timeout.as_millis() as u64,
                "no save acknowledgement before timeout, proceeding"
            );
        }
        Some(confirmation)
    }
}
