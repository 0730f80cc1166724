//! Handlers for messages arriving on the hand-off channels.
//!
//! All of these run on a transport subscriber task, so none of them may
//! wait: anything slow (like an actual save) is spawned onto the runtime.
//! A payload that cannot be decoded is logged and dropped; the subscriber
//! keeps going with the next message.

use std::future::Future;
use std::sync::Arc;

use handoff_protocol::{
    BroadcastMessage, EntityId, ProtocolError, ServerId, decode_broadcast,
    decode_entity, encode_broadcast, encode_entity,
};
use handoff_session::PendingConfirmations;
use handoff_transport::{MessageHandler, PubSub};

// ---------------------------------------------------------------------------
// Proxy side: save acknowledgements
// ---------------------------------------------------------------------------

/// Resolves pending confirmations when a backend reports a finished save.
pub struct SaveAckHandler {
    pending: PendingConfirmations,
}

impl SaveAckHandler {
    pub fn new(pending: PendingConfirmations) -> Self {
        Self { pending }
    }
}

impl MessageHandler for SaveAckHandler {
    fn handle(&self, channel: &str, payload: &str) {
        match decode_entity(payload) {
            Ok(entity_id) => {
                let woke = self.pending.resolve(entity_id);
                tracing::debug!(%entity_id, woke, "save acknowledgement received");
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping malformed save acknowledgement");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Backend side: save requests
// ---------------------------------------------------------------------------

/// The backend's persistence layer, as far as the hand-off protocol cares.
pub trait PlayerSaver: Send + Sync + 'static {
    /// The error type for failed saves.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `true` if this server currently holds `entity_id`.
    fn hosts(&self, entity_id: EntityId) -> bool;

    /// Durably persists `entity_id`'s state.
    fn save(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Answers save requests on a backend server.
///
/// For each request naming a player this server hosts, runs
/// [`PlayerSaver::save`] and publishes the acknowledgement once it
/// succeeds. A failed save is not acknowledged; the proxy's timeout
/// releases the player instead.
pub struct SaveRequestResponder<P: PubSub, S: PlayerSaver> {
    transport: Arc<P>,
    saver: Arc<S>,
    ack_channel: String,
}

impl<P: PubSub, S: PlayerSaver> SaveRequestResponder<P, S> {
    pub fn new(
        transport: Arc<P>,
        saver: Arc<S>,
        ack_channel: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            saver,
            ack_channel: ack_channel.into(),
        }
    }
}

impl<P: PubSub, S: PlayerSaver> MessageHandler for SaveRequestResponder<P, S> {
    fn handle(&self, channel: &str, payload: &str) {
        let entity_id = match decode_entity(payload) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping malformed save request");
                return;
            }
        };
        if !self.saver.hosts(entity_id) {
            tracing::trace!(%entity_id, "save request for a player hosted elsewhere");
            return;
        }

        let transport = Arc::clone(&self.transport);
        let saver = Arc::clone(&self.saver);
        let ack_channel = self.ack_channel.clone();
        tokio::spawn(async move {
            match saver.save(entity_id).await {
                Ok(()) => {
                    transport.publish(&ack_channel, encode_entity(&entity_id));
                    tracing::debug!(%entity_id, "player saved, acknowledgement sent");
                }
                Err(e) => {
                    tracing::error!(%entity_id, error = %e, "player save failed");
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Broadcast relay
// ---------------------------------------------------------------------------

/// Receives broadcasts relayed from other servers.
pub trait BroadcastSink: Send + Sync + 'static {
    fn deliver(&self, msg: BroadcastMessage);
}

/// Forwards broadcasts from other servers to a local [`BroadcastSink`].
///
/// Messages whose `origin` is this server were already shown locally
/// when they were sent, so they are skipped.
pub struct BroadcastRelay<S: BroadcastSink> {
    local: ServerId,
    sink: S,
}

impl<S: BroadcastSink> BroadcastRelay<S> {
    pub fn new(local: ServerId, sink: S) -> Self {
        Self { local, sink }
    }
}

impl<S: BroadcastSink> MessageHandler for BroadcastRelay<S> {
    fn handle(&self, channel: &str, payload: &str) {
        match decode_broadcast(payload) {
            Ok(msg) if msg.origin == self.local => {}
            Ok(msg) => self.sink.deliver(msg),
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping malformed broadcast");
            }
        }
    }
}

/// Publishes broadcasts on behalf of one server.
pub struct BroadcastPublisher<P: PubSub> {
    transport: Arc<P>,
    origin: ServerId,
    channel: String,
}

impl<P: PubSub> BroadcastPublisher<P> {
    pub fn new(
        transport: Arc<P>,
        origin: ServerId,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            origin,
            channel: channel.into(),
        }
    }

    /// Relays `text` to every other server, attributed to `sender`.
    pub fn broadcast(
        &self,
        sender: Option<&str>,
        text: &str,
    ) -> Result<(), ProtocolError> {
        let payload = encode_broadcast(&BroadcastMessage {
            origin: self.origin.clone(),
            sender: sender.map(str::to_string),
            text: text.to_string(),
        })?;
        self.transport.publish(&self.channel, payload);
        Ok(())
    }
}
