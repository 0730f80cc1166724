//! Reconnect delay policy for subscriber loops.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with random jitter.
///
/// Starts at `initial`, doubles on every failure up to `max`, and adds up
/// to 25% random jitter so many subscriber loops that lost the broker at
/// the same instant do not all reconnect at the same instant.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// Returns the next delay (with jitter) and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);

        let jitter_cap = (base.as_millis() / 4) as u64;
        if jitter_cap == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=jitter_cap);
        base + Duration::from_millis(jitter)
    }

    /// Resets the schedule after a successful (re)connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(10))
    }
}
