//! The pending-confirmation table: players whose save is in flight.
//!
//! A hand-off task calls [`PendingConfirmations::register`] just before
//! asking the source server to save, then awaits the returned
//! [`PendingWait`]. The transport's ack handler calls
//! [`PendingConfirmations::resolve`] when the save-completed message
//! arrives. Whichever happens first, the acknowledgement or the timeout,
//! decides the outcome; the other side becomes a no-op.
//!
//! # Replacement
//!
//! Only one waiter per player can be registered. A second `wait` for the
//! same player replaces the first and removes it from the table, so a
//! later `resolve` completes the *newer* waiter. The replaced waiter is
//! abandoned: it wakes as soon as it is replaced and reports
//! [`Confirmation::Superseded`], so its caller can step aside for the
//! newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use handoff_protocol::EntityId;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// How a wait for a save acknowledgement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The acknowledgement arrived before the deadline.
    Confirmed,
    /// The deadline passed first.
    TimedOut,
    /// A newer wait for the same player replaced this one.
    Superseded,
}

impl Confirmation {
    /// Returns `true` for [`Confirmation::Confirmed`].
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// A registered waiter.
struct Waiter {
    /// Distinguishes this registration from a later one for the same
    /// player, so cleanup never removes somebody else's waiter.
    ticket: u64,
    created_at: Instant,
    tx: oneshot::Sender<()>,
}

/// Concurrent map from player to their outstanding save confirmation.
///
/// Cheap to clone: clones share the same table.
#[derive(Clone, Default)]
pub struct PendingConfirmations {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    waiters: DashMap<EntityId, Waiter>,
    next_ticket: AtomicU64,
}

/// A registered waiter that has not been awaited yet.
///
/// Registration happens in [`PendingConfirmations::register`], before the
/// caller publishes its save request, so an acknowledgement can never
/// arrive ahead of the waiter it is meant for. Dropping a `PendingWait`
/// (awaited or not) removes its entry unless a newer waiter replaced it.
pub struct PendingWait {
    table: PendingConfirmations,
    id: EntityId,
    ticket: u64,
    deadline: Instant,
    rx: Option<oneshot::Receiver<()>>,
}

impl PendingWait {
    /// The player this waiter belongs to.
    pub fn entity_id(&self) -> EntityId {
        self.id
    }

    /// Suspends until resolved or until the deadline fixed at
    /// registration time.
    pub async fn wait(mut self) -> Confirmation {
        let Some(rx) = self.rx.take() else {
            return Confirmation::TimedOut;
        };
        match tokio::time::timeout_at(self.deadline, rx).await {
            Ok(Ok(())) => Confirmation::Confirmed,
            // The sender was dropped without resolving: replaced.
            Ok(Err(_)) => Confirmation::Superseded,
            Err(_) => Confirmation::TimedOut,
        }
    }
}

impl Drop for PendingWait {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.table
            .inner
            .waiters
            .remove_if(&self.id, |_, waiter| waiter.ticket == ticket);
    }
}

impl PendingConfirmations {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `id` that will give up after `timeout`.
    ///
    /// Any waiter already registered for `id` is replaced and removed.
    pub fn register(&self, id: EntityId, timeout: Duration) -> PendingWait {
        let (tx, rx) = oneshot::channel();
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let previous = self.inner.waiters.insert(
            id,
            Waiter {
                ticket,
                created_at: now,
                tx,
            },
        );
        if previous.is_some() {
            tracing::debug!(
                entity_id = %id,
                "replaced outstanding save confirmation"
            );
        }

        PendingWait {
            table: self.clone(),
            id,
            ticket,
            deadline: now + timeout,
            rx: Some(rx),
        }
    }

    /// Registers a waiter for `id` and suspends until it is resolved or
    /// `timeout` elapses.
    ///
    /// The entry is removed from the table before this returns, whatever
    /// the outcome.
    pub async fn wait(&self, id: EntityId, timeout: Duration) -> Confirmation {
        self.register(id, timeout).wait().await
    }

    /// Completes the waiter for `id`, if any.
    ///
    /// Returns `true` when a waiter was woken. Unknown ids, late
    /// acknowledgements and repeated calls return `false` and change
    /// nothing.
    pub fn resolve(&self, id: EntityId) -> bool {
        match self.inner.waiters.remove(&id) {
            Some((_, waiter)) => {
                let woke = waiter.tx.send(()).is_ok();
                tracing::trace!(
                    entity_id = %id,
                    woke,
                    "save confirmation resolved"
                );
                woke
            }
            None => {
                tracing::trace!(
                    entity_id = %id,
                    "no pending confirmation, ignoring"
                );
                false
            }
        }
    }

    /// Returns `true` if a waiter is registered for `id`.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.waiters.contains_key(id)
    }

    /// When the current waiter for `id` was registered.
    pub fn pending_since(&self, id: &EntityId) -> Option<Instant> {
        self.inner.waiters.get(id).map(|waiter| waiter.created_at)
    }

    /// Number of outstanding waiters.
    pub fn len(&self) -> usize {
        self.inner.waiters.len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.waiters.is_empty()
    }
}
