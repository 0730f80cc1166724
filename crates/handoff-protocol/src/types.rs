//! Core protocol types: who is being handed off, between which servers,
//! and on which channels the processes talk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Channel on which the proxy asks a backend to persist a player.
///
/// Payload: the player's [`EntityId`] in canonical text form.
pub const SAVE_REQUEST_CHANNEL: &str = "handoff:save-request";

/// Channel on which a backend confirms that a requested save completed.
///
/// Payload: the player's [`EntityId`] in canonical text form.
pub const SAVE_ACK_CHANNEL: &str = "handoff:save-ack";

/// Channel carrying cross-server broadcast/chat messages as JSON.
pub const BROADCAST_CHANNEL: &str = "handoff:broadcast";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identifier for a player session, shared by every process.
///
/// A newtype over [`Uuid`] so an entity can never be confused with any
/// other UUID-shaped value. The canonical text form (used on the wire)
/// is the lowercase hyphenated UUID, e.g.
/// `67e55044-10b1-426f-9247-bb680e5fe0c8`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Uuid::parse_str(trimmed).map(Self).map_err(|source| {
            ProtocolError::MalformedEntityId {
                payload: trimmed.chars().take(64).collect(),
                source,
            }
        })
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Name of a backend game-server process as known to the routing proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Creates a server id from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ServerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ---------------------------------------------------------------------------
// Broadcast relay
// ---------------------------------------------------------------------------

/// A message relayed to every server through [`BROADCAST_CHANNEL`].
///
/// `origin` lets each server skip the messages it published itself.
/// `sender` is the display name of the player who spoke, or `None` for
/// system announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub origin: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub text: String,
}
