//! Error types for the protocol layer.
//!
//! Each crate in Handoff defines its own error enum. A `ProtocolError`
//! always means a payload could not be understood, never that the
//! network misbehaved.

/// Errors that can occur while decoding channel payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is not a canonical entity identifier.
    ///
    /// Carries the offending payload (truncated) so it can be logged.
    #[error("malformed entity id {payload:?}: {source}")]
    MalformedEntityId {
        payload: String,
        #[source]
        source: uuid::Error,
    },

    /// Serializing a broadcast payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A broadcast payload is not valid JSON for [`BroadcastMessage`].
    ///
    /// [`BroadcastMessage`]: crate::BroadcastMessage
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload decoded but violates a protocol rule (e.g. an empty
    /// origin server).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
