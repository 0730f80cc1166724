//! Payload encoding for the hand-off channels.
//!
//! Save requests and acknowledgements carry nothing but the player's id
//! as plain text, so any process that can publish a string can take part
//! in the protocol. Broadcast messages are JSON.

use crate::{EntityId, ProtocolError};
#[cfg(feature = "json")]
use crate::BroadcastMessage;

/// Encodes an entity id as a save-request or save-ack payload.
pub fn encode_entity(id: &EntityId) -> String {
    id.to_string()
}

/// Decodes a save-request or save-ack payload.
///
/// # Errors
/// Returns [`ProtocolError::MalformedEntityId`] when the payload is not a
/// UUID. Callers on a subscriber loop should log and drop the message.
pub fn decode_entity(payload: &str) -> Result<EntityId, ProtocolError> {
    payload.parse()
}

/// Serializes a broadcast message to its JSON payload.
#[cfg(feature = "json")]
pub fn encode_broadcast(
    msg: &BroadcastMessage,
) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Parses a broadcast payload.
///
/// # Errors
/// - [`ProtocolError::Decode`]: not JSON, or the wrong shape
/// - [`ProtocolError::InvalidMessage`]: the origin server is empty
#[cfg(feature = "json")]
pub fn decode_broadcast(
    payload: &str,
) -> Result<BroadcastMessage, ProtocolError> {
    let msg: BroadcastMessage =
        serde_json::from_str(payload).map_err(ProtocolError::Decode)?;
    if msg.origin.as_str().is_empty() {
        return Err(ProtocolError::InvalidMessage(
            "broadcast origin must not be empty".into(),
        ));
    }
    Ok(msg)
}
