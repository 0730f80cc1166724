//! One-shot permissions to pass the hand-off gate.

use std::sync::Arc;

use dashmap::DashSet;
use handoff_protocol::EntityId;

/// Players allowed to skip the save gate on their very next switch.
///
/// A token is marked once the source server's save has been confirmed
/// (or given up on), and consumed by the routing attempt that the
/// coordinator re-issues. `consume_if_present` is a single atomic
/// remove, so two racing routing attempts can never both pass on one
/// token.
///
/// Cheap to clone: clones share the same set.
#[derive(Clone, Default)]
pub struct SafeTransferTokens {
    tokens: Arc<DashSet<EntityId>>,
}

impl SafeTransferTokens {
    /// Creates an empty token set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `id` one bypass. Returns `false` if it already had one.
    pub fn mark(&self, id: EntityId) -> bool {
        let fresh = self.tokens.insert(id);
        tracing::trace!(entity_id = %id, fresh, "safe-transfer token marked");
        fresh
    }

    /// Takes the bypass for `id`, returning whether there was one.
    pub fn consume_if_present(&self, id: EntityId) -> bool {
        self.tokens.remove(&id).is_some()
    }

    /// Returns `true` if `id` holds a bypass, without consuming it.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.tokens.contains(id)
    }

    /// Number of outstanding tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are outstanding.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
