//! Integration tests for the hand-off bookkeeping structures.
//!
//! Timeout tests run on a paused Tokio clock (`start_paused = true`), so
//! a two-second deadline costs nothing and elapsed time is exact.

use std::time::Duration;

use handoff_protocol::EntityId;
use handoff_session::{Confirmation, PendingConfirmations, SafeTransferTokens};
use tokio::time::Instant;

const ACK_TIMEOUT: Duration = Duration::from_millis(2_000);

// =========================================================================
// Helpers
// =========================================================================

/// Spawns `table.wait(id, timeout)` and lets it register before returning.
async fn spawn_wait(
    table: &PendingConfirmations,
    id: EntityId,
    timeout: Duration,
) -> tokio::task::JoinHandle<Confirmation> {
    let table = table.clone();
    let handle = tokio::spawn(async move { table.wait(id, timeout).await });
    tokio::task::yield_now().await;
    handle
}

// =========================================================================
// PendingConfirmations::wait
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_without_resolve_times_out_at_deadline() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();
    let start = Instant::now();

    let outcome = table.wait(id, ACK_TIMEOUT).await;

    assert_eq!(outcome, Confirmation::TimedOut);
    assert_eq!(start.elapsed(), ACK_TIMEOUT);
    assert!(!table.contains(&id), "entry removed after timeout");
}

#[tokio::test(start_paused = true)]
async fn test_wait_resolved_early_returns_confirmed_before_deadline() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();
    let start = Instant::now();
    let waiter = spawn_wait(&table, id, ACK_TIMEOUT).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(table.resolve(id));

    assert_eq!(waiter.await.unwrap(), Confirmation::Confirmed);
    assert!(start.elapsed() < ACK_TIMEOUT);
    assert!(table.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wait_zero_timeout_returns_immediately() {
    let table = PendingConfirmations::new();
    let outcome = table.wait(EntityId::random(), Duration::ZERO).await;
    assert_eq!(outcome, Confirmation::TimedOut);
}

// =========================================================================
// PendingConfirmations::resolve
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_resolve_twice_second_is_noop() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();
    let waiter = spawn_wait(&table, id, ACK_TIMEOUT).await;

    assert!(table.resolve(id));
    assert!(!table.resolve(id));

    assert_eq!(waiter.await.unwrap(), Confirmation::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_resolve_after_timeout_is_noop() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();

    assert_eq!(table.wait(id, ACK_TIMEOUT).await, Confirmation::TimedOut);

    assert!(!table.resolve(id));
    assert!(table.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resolve_only_wakes_matching_player() {
    let table = PendingConfirmations::new();
    let alice = EntityId::random();
    let bob = EntityId::random();
    let alice_wait = spawn_wait(&table, alice, ACK_TIMEOUT).await;
    let bob_wait = spawn_wait(&table, bob, ACK_TIMEOUT).await;

    table.resolve(bob);

    assert_eq!(bob_wait.await.unwrap(), Confirmation::Confirmed);
    assert_eq!(alice_wait.await.unwrap(), Confirmation::TimedOut);
}

// =========================================================================
// Replacement (last writer wins)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_second_wait_supersedes_first_immediately() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();
    let start = Instant::now();

    let first = spawn_wait(&table, id, Duration::from_secs(5)).await;
    let second = spawn_wait(&table, id, ACK_TIMEOUT).await;

    // At most one entry per player.
    assert_eq!(table.len(), 1);

    // The replaced waiter is abandoned without waiting out its deadline.
    assert_eq!(first.await.unwrap(), Confirmation::Superseded);
    assert_eq!(start.elapsed(), Duration::ZERO);

    assert!(table.resolve(id));
    assert_eq!(second.await.unwrap(), Confirmation::Confirmed);
    assert!(table.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_replaced_waiter_cleanup_keeps_newer_entry() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();

    let first = spawn_wait(&table, id, Duration::from_millis(100)).await;
    let second = spawn_wait(&table, id, Duration::from_secs(10)).await;

    // First waiter finishes while the second is still pending.
    assert_eq!(first.await.unwrap(), Confirmation::Superseded);
    assert!(table.contains(&id), "newer waiter must survive");

    assert!(table.resolve(id));
    assert_eq!(second.await.unwrap(), Confirmation::Confirmed);
}

#[tokio::test(start_paused = true)]
async fn test_replaced_waiter_is_superseded_even_if_newer_times_out() {
    let table = PendingConfirmations::new();
    let id = EntityId::random();

    let first = spawn_wait(&table, id, ACK_TIMEOUT).await;
    let second = spawn_wait(&table, id, ACK_TIMEOUT).await;

    assert_eq!(first.await.unwrap(), Confirmation::Superseded);
    assert_eq!(second.await.unwrap(), Confirmation::TimedOut);
    assert!(table.is_empty());
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_players_resolve_in_parallel() {
    let table = PendingConfirmations::new();
    let ids: Vec<EntityId> = (0..64).map(|_| EntityId::random()).collect();

    let waiters: Vec<_> = ids
        .iter()
        .map(|&id| {
            let table = table.clone();
            tokio::spawn(async move {
                table.wait(id, Duration::from_secs(5)).await
            })
        })
        .collect();

    // Resolve each player as soon as its waiter is registered.
    for &id in &ids {
        while !table.resolve(id) {
            tokio::task::yield_now().await;
        }
    }

    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), Confirmation::Confirmed);
    }
    assert!(table.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_token_consumed_exactly_once_under_contention() {
    let tokens = SafeTransferTokens::new();
    let id = EntityId::random();
    tokens.mark(id);

    let attempts: Vec<_> = (0..32)
        .map(|_| {
            let tokens = tokens.clone();
            tokio::spawn(async move { tokens.consume_if_present(id) })
        })
        .collect();

    let mut passed = 0;
    for attempt in attempts {
        if attempt.await.unwrap() {
            passed += 1;
        }
    }
    assert_eq!(passed, 1, "exactly one routing attempt may bypass");
    assert!(tokens.is_empty());
}
