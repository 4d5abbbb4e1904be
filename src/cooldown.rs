//! Per-owner action throttling.
//!
//! Tracks the last time each (scope, owner) used a throttled action. State is
//! ephemeral — it does not survive a restart, and an absent entry means the
//! cooldown is satisfied. The check-and-reset is a single atomic step per
//! key, so two concurrent callers can never both observe "ready".

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// The action may proceed; the timestamp was reset to `now`.
    Ready,
    /// The action was used too recently; state was not mutated.
    Wait(Duration),
}

impl CooldownStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CooldownStatus::Ready)
    }
}

/// Last-use tracker for one throttled action. Instantiate one tracker per
/// independent action (payday and slot plays do not share timers).
#[derive(Default)]
pub struct CooldownTracker {
    last_used: Mutex<HashMap<(String, String), Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// If the interval has elapsed (or the key was never used), record `now`
    /// and report ready. Otherwise report the remaining wait without touching
    /// state. One atomic step per key.
    pub fn check_and_reset(
        &self,
        scope_id: &str,
        owner_id: &str,
        now: Instant,
        interval: Duration,
    ) -> CooldownStatus {
        let mut last_used = self.last_used.lock();
        let key = (scope_id.to_string(), owner_id.to_string());
        if let Some(&last) = last_used.get(&key) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < interval {
                return CooldownStatus::Wait(interval - elapsed);
            }
        }
        last_used.insert(key, now);
        CooldownStatus::Ready
    }

    /// Forget a key, re-arming the action immediately. Used to hand back a
    /// consumed cooldown when the action it gated could not complete.
    pub fn clear(&self, scope_id: &str, owner_id: &str) {
        self.last_used
            .lock()
            .remove(&(scope_id.to_string(), owner_id.to_string()));
    }

    /// Drop entries older than `horizon` (call from a maintenance pass).
    pub fn cleanup(&self, now: Instant, horizon: Duration) {
        self.last_used
            .lock()
            .retain(|_, &mut last| now.saturating_duration_since(last) < horizon);
    }
}
