//! The seam between the hand-off gate and the routing proxy.
//!
//! Handoff does not move players itself. The proxy framework raises a
//! [`RoutingEvent`] whenever a player is about to be connected somewhere,
//! hands it to a [`RoutingGate`], and honours the decision the gate leaves
//! in the event. When the gate needs to replay a switch later, it asks the
//! framework through a [`Reconnector`].

use std::future::Future;

use handoff_protocol::{EntityId, ServerId};
use tokio::task::JoinHandle;

use crate::HandoffReport;

/// Whether the framework may carry out the connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    #[default]
    Allow,
    Deny,
}

/// One connection attempt, as seen by the gate.
///
/// `previous_server` is `None` on the player's initial login.
/// `proposed_target` is `None` when the framework has not picked a server
/// yet. The gate only acts when both are present and differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEvent {
    pub entity_id: EntityId,
    pub previous_server: Option<ServerId>,
    pub proposed_target: Option<ServerId>,
    pub decision: Decision,
}

impl RoutingEvent {
    /// Creates an event whose decision starts as [`Decision::Allow`].
    pub fn new(
        entity_id: EntityId,
        previous_server: Option<ServerId>,
        proposed_target: Option<ServerId>,
    ) -> Self {
        Self {
            entity_id,
            previous_server,
            proposed_target,
            decision: Decision::Allow,
        }
    }

    /// Returns the target when this attempt moves the player from one
    /// server to a different one.
    pub fn switch_target(&self) -> Option<&ServerId> {
        match (&self.previous_server, &self.proposed_target) {
            (Some(from), Some(to)) if from != to => Some(to),
            _ => None,
        }
    }
}

/// Result of a reconnection request issued by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectResult {
    pub success: bool,
}

/// Asks the routing framework to connect a player to a server.
///
/// Implemented by the proxy integration. The gate calls it once per
/// held switch, after the save round-trip, and never retries.
pub trait Reconnector: Send + Sync + 'static {
    /// Connects `entity_id` to `target`, resolving once the framework
    /// knows whether the connection succeeded.
    fn connect(
        &self,
        entity_id: EntityId,
        target: &ServerId,
    ) -> impl Future<Output = ReconnectResult> + Send;
}

/// What the gate did with a routing event.
#[derive(Debug)]
pub enum GateOutcome {
    /// Not a server switch (initial login, or same server). Untouched.
    PassThrough,
    /// The transport is down, so the switch is let through ungated.
    TransportUnavailable,
    /// A safe-transfer token was consumed. Untouched.
    Allowed,
    /// The switch was denied and a hand-off task started. The task
    /// reports how the save round-trip and the replayed switch went, or
    /// that a newer switch for the same player superseded it.
    Deferred(JoinHandle<HandoffReport>),
}

impl GateOutcome {
    /// Returns `true` if the gate left the decision as it was.
    pub fn allowed(&self) -> bool {
        !matches!(self, Self::Deferred(_))
    }
}

/// Explicit hook the routing framework calls for every connection attempt.
///
/// Called synchronously from the framework's dispatch loop; it may
/// overwrite `event.decision` but never blocks. The dispatch thread does
/// not need to be inside a Tokio runtime: deferred work runs on the
/// runtime the gate was built in.
pub trait RoutingGate: Send + Sync {
    /// Inspects (and possibly denies) one connection attempt.
    fn handle(&self, event: &mut RoutingEvent) -> GateOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(from: Option<&str>, to: Option<&str>) -> RoutingEvent {
        RoutingEvent::new(
            EntityId::random(),
            from.map(ServerId::from),
            to.map(ServerId::from),
        )
    }

    #[test]
    fn test_new_event_defaults_to_allow() {
        assert_eq!(event(None, Some("lobby")).decision, Decision::Allow);
    }

    #[test]
    fn test_switch_target_between_servers() {
        let e = event(Some("lobby"), Some("dungeon"));
        assert_eq!(e.switch_target(), Some(&ServerId::from("dungeon")));
    }

    #[test]
    fn test_switch_target_initial_login_is_none() {
        assert_eq!(event(None, Some("lobby")).switch_target(), None);
    }

    #[test]
    fn test_switch_target_same_server_is_none() {
        assert_eq!(event(Some("lobby"), Some("lobby")).switch_target(), None);
    }

    #[test]
    fn test_switch_target_without_target_is_none() {
        assert_eq!(event(Some("lobby"), None).switch_target(), None);
    }
}
