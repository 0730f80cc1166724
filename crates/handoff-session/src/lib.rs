//! Per-player bookkeeping for cross-server hand-offs.
//!
//! This crate holds the only mutable state the hand-off protocol shares
//! between tasks:
//!
//! 1. **Pending confirmations**: who is waiting for a save
//!    acknowledgement ([`PendingConfirmations`])
//! 2. **Safe-transfer tokens**: who may skip the gate on their next
//!    switch ([`SafeTransferTokens`])
//!
//! Both are keyed by [`EntityId`](handoff_protocol::EntityId) and are safe
//! to use from any number of tasks at once. Operations are atomic per key;
//! nothing spans two keys, so hand-offs for different players never wait
//! on each other.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← waits on confirmations, consumes tokens
//!     ↕
//! Session Layer (this crate)  ← per-player waiters and tokens
//!     ↕
//! Protocol Layer (below)  ← provides EntityId
//! ```

mod pending;
mod tokens;

pub use pending::{Confirmation, PendingConfirmations, PendingWait};
pub use tokens::SafeTransferTokens;
