//! Stats collector: per-game counters written only by the table loop and
//! read via an atomic snapshot from the admin endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// A point-in-time copy, safe to serialize and hand to the admin endpoint
/// without holding any lock the table loop might want.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub hands_completed: u64,
    pub sum_net_chips_by_player: BTreeMap<String, i64>,
    pub timeout_count: u64,
    pub fault_count: u64,
}

/// Shared between the table loop (sole writer) and the admin HTTP handler
/// (read-only). Counters that are genuinely independent use `AtomicU64`;
/// the per-player chip ledger needs a map, so it lives behind a `Mutex`
/// that is only ever held for the duration of a single insert/snapshot.
#[derive(Debug, Default)]
pub struct GameStats {
    hands_completed: AtomicU64,
    timeout_count: AtomicU64,
    fault_count: AtomicU64,
    net_chips_by_player: Mutex<BTreeMap<String, i64>>,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hand_completed(&self, net_chips_by_player: &BTreeMap<String, i64>) {
        self.hands_completed.fetch_add(1, Ordering::Relaxed);
        let mut totals = self.net_chips_by_player.lock().unwrap();
        for (name, net) in net_chips_by_player {
            *totals.entry(name.clone()).or_insert(0) += net;
        }
    }

    pub fn record_timeout(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.fault_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hands_completed(&self) -> u64 {
        self.hands_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hands_completed: self.hands_completed.load(Ordering::Relaxed),
            sum_net_chips_by_player: self.net_chips_by_player.lock().unwrap().clone(),
            timeout_count: self.timeout_count.load(Ordering::Relaxed),
            fault_count: self.fault_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_hands_and_stays_zero_sum() {
        let stats = GameStats::new();
        let mut net = BTreeMap::new();
        net.insert("alice".to_string(), 10i64);
        net.insert("bob".to_string(), -10i64);
        stats.record_hand_completed(&net);
        stats.record_hand_completed(&net);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hands_completed, 2);
        assert_eq!(snapshot.sum_net_chips_by_player["alice"], 20);
        assert_eq!(snapshot.sum_net_chips_by_player["bob"], -20);
        let total: i64 = snapshot.sum_net_chips_by_player.values().sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn timeout_and_fault_counts_are_independent_of_hand_counts() {
        let stats = GameStats::new();
        stats.record_timeout();
        stats.record_timeout();
        stats.record_fault();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.timeout_count, 2);
        assert_eq!(snapshot.fault_count, 1);
        assert_eq!(snapshot.hands_completed, 0);
    }
}
