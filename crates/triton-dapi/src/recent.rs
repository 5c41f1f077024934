//! Recent-server memory: an allocator-instance-local record of which
//! servers were picked how recently, used to spread rapid-fire allocations
//! across the fleet instead of stampeding the single best-scoring server.

use std::collections::HashMap;

use triton_core::uuid::ServerUuid;

use crate::config::{RECENT_SERVER_SOFT_DROP_FRACTION, RECENT_SERVER_TTL_MS};

/// Tracks the last-used timestamp (in milliseconds) of each recently
/// allocated server. Entries older than [`RECENT_SERVER_TTL_MS`] are purged
/// whenever [`RecentServerMemory::purge`] runs, which the allocator does
/// once per evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentServerMemory {
    last_used_ms: HashMap<ServerUuid, i64>,
}

impl RecentServerMemory {
    /// Creates an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every entry older than the TTL relative to `now_ms`.
    pub fn purge(&mut self, now_ms: i64) {
        self.last_used_ms
            .retain(|_, last_used| now_ms.saturating_sub(*last_used) < RECENT_SERVER_TTL_MS);
    }

    /// Records that `server` was just chosen, at `now_ms`.
    pub fn record(&mut self, server: ServerUuid, now_ms: i64) {
        self.last_used_ms.insert(server, now_ms);
    }

    /// Returns `true` if `server` was used within the TTL window as of
    /// `now_ms`.
    #[must_use]
    pub fn is_recent(&self, server: ServerUuid, now_ms: i64) -> bool {
        self.last_used_ms
            .get(&server)
            .is_some_and(|last_used| now_ms.saturating_sub(*last_used) < RECENT_SERVER_TTL_MS)
    }

    /// Returns the servers currently remembered as recent, most-recently-used
    /// first, for the soft filter's "drop up to 25%, most-recent first"
    /// rule.
    #[must_use]
    pub fn most_recent_first(&self, candidates: &[ServerUuid]) -> Vec<ServerUuid> {
        let mut recent: Vec<ServerUuid> = candidates
            .iter()
            .copied()
            .filter(|uuid| self.last_used_ms.contains_key(uuid))
            .collect();
        recent.sort_by_key(|uuid| std::cmp::Reverse(self.last_used_ms[uuid]));
        recent
    }

    /// The maximum number of candidates `soft-filter-recent-servers` may
    /// drop: [`RECENT_SERVER_SOFT_DROP_FRACTION`] of the current candidate
    /// count, rounded down.
    #[must_use]
    pub fn max_soft_drop(candidate_count: usize) -> usize {
        ((candidate_count as f64) * RECENT_SERVER_SOFT_DROP_FRACTION).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_removes_stale_entries() {
        let mut memory = RecentServerMemory::new();
        let server = ServerUuid::new_v4();
        memory.record(server, 1_000);
        memory.purge(1_000 + RECENT_SERVER_TTL_MS + 1);
        assert!(!memory.is_recent(server, 1_000 + RECENT_SERVER_TTL_MS + 1));
    }

    #[test]
    fn is_recent_within_ttl() {
        let mut memory = RecentServerMemory::new();
        let server = ServerUuid::new_v4();
        memory.record(server, 1_000);
        assert!(memory.is_recent(server, 1_000 + RECENT_SERVER_TTL_MS - 1));
        assert!(!memory.is_recent(server, 1_000 + RECENT_SERVER_TTL_MS));
    }

    #[test]
    fn most_recent_first_orders_by_recency() {
        let mut memory = RecentServerMemory::new();
        let a = ServerUuid::new_v4();
        let b = ServerUuid::new_v4();
        memory.record(a, 1_000);
        memory.record(b, 2_000);
        let ordered = memory.most_recent_first(&[a, b]);
        assert_eq!(ordered, vec![b, a]);
    }

    #[test]
    fn max_soft_drop_is_25_percent_floor() {
        assert_eq!(RecentServerMemory::max_soft_drop(10), 2);
        assert_eq!(RecentServerMemory::max_soft_drop(3), 0);
        assert_eq!(RecentServerMemory::max_soft_drop(4), 1);
    }
}
