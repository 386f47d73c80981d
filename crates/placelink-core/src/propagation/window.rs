//! Idempotency window.

use crate::clock::Clock;
use crate::links::LinkId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default lifetime of a window entry.
pub const DEFAULT_WINDOW_TTL: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct WindowEntry {
    claimed: HashSet<LinkId>,
    expires_at: u64,
}

/// Claims link ids per logical timestamp so near-simultaneous edits of
/// one cluster cascade each link once.
///
/// Entries expire `ttl` after they are created. Expiry is lazy and driven
/// by the injected clock.
pub struct IdempotencyWindow {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<u64, WindowEntry>>,
}

impl IdempotencyWindow {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically claim `link_id` for `timestamp`. Returns `false` if it was
    /// already claimed in this window.
    pub fn try_claim(&self, timestamp: u64, link_id: &str) -> bool {
        !self.claim(timestamp, [link_id]).is_empty()
    }

    /// Claim several ids at once. Returns the ids that were newly claimed.
    pub fn claim<'a>(
        &self,
        timestamp: u64,
        link_ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<LinkId> {
        let now = self.clock.now_millis();
        let ttl = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);

        let entry = entries.entry(timestamp).or_insert_with(|| WindowEntry {
            claimed: HashSet::new(),
            expires_at: now.saturating_add(ttl),
        });
        link_ids
            .into_iter()
            .filter(|id| entry.claimed.insert((*id).to_string()))
            .map(str::to_string)
            .collect()
    }

    pub fn is_claimed(&self, timestamp: u64, link_id: &str) -> bool {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&timestamp)
            .is_some_and(|entry| entry.expires_at > now && entry.claimed.contains(link_id))
    }

    /// Drop the entry for `timestamp` early.
    pub fn release(&self, timestamp: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&timestamp);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_claim_once_per_window() {
        let clock = Arc::new(ManualClock::new(0));
        let window = IdempotencyWindow::new(clock.clone(), DEFAULT_WINDOW_TTL);

        assert!(window.try_claim(100, "L2"));
        assert!(!window.try_claim(100, "L2"));
        assert!(window.try_claim(101, "L2"));
        assert_eq!(window.claim(100, ["L1", "L2"]), vec!["L1".to_string()]);
    }

    #[test]
    fn test_entries_expire() {
        let clock = Arc::new(ManualClock::new(0));
        let window = IdempotencyWindow::new(clock.clone(), DEFAULT_WINDOW_TTL);
        assert!(window.try_claim(100, "L2"));

        clock.advance(Duration::from_millis(1_999));
        assert!(window.is_claimed(100, "L2"));
        clock.advance(Duration::from_millis(1));
        assert!(!window.is_claimed(100, "L2"));
        assert!(window.is_empty());
        assert!(window.try_claim(100, "L2"));
    }
}
