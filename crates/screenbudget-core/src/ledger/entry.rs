//! Credit entries and decay arithmetic.
//!
//! One entry per earned unit of screen time. Balances halve once per whole
//! calendar day since creation and are forced to zero after 30 days, which
//! bounds the halving loop and discourages hoarding. All timestamps are
//! epoch milliseconds; elapsed time that would be negative (device clock
//! moved backwards) counts as zero.

use serde::{Deserialize, Serialize};

/// Milliseconds in one whole day.
pub(crate) const DAY_MS: i64 = 86_400_000;

/// Decay stops here: an entry this old always reads zero.
pub const DECAY_CAP_DAYS: i64 = 30;

/// One decaying unit of earned screen time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditEntry {
    /// Unique, stable across updates.
    pub id: String,
    /// Which exercise produced it; absent for migrated legacy credit.
    #[serde(default)]
    pub sport_id: Option<String>,
    /// Earn time (epoch ms); immutable.
    pub created_at: i64,
    /// Seconds earned at creation, adjusted only by re-upsert.
    pub original_seconds: u64,
    /// Spendable balance.
    pub remaining_seconds: u64,
    /// Last time decay was applied; advances only in whole-day increments
    /// from `created_at`.
    pub last_decay_at: i64,
    /// Whole-day halvings already applied.
    pub decay_count: u32,
}

impl CreditEntry {
    pub fn new(id: String, sport_id: Option<String>, created_at: i64, total_seconds: u64) -> Self {
        Self {
            id,
            sport_id,
            created_at,
            original_seconds: total_seconds,
            remaining_seconds: total_seconds,
            last_decay_at: created_at,
            decay_count: 0,
        }
    }

    /// Whole days elapsed since creation, clamped to `[0, DECAY_CAP_DAYS]`.
    fn elapsed_days(&self, now_ms: i64) -> u32 {
        let elapsed_ms = (now_ms - self.created_at).max(0);
        (elapsed_ms / DAY_MS).min(DECAY_CAP_DAYS) as u32
    }

    /// Apply pending whole-day halvings. Returns `true` when the entry
    /// changed. Idempotent for a fixed `now_ms`.
    pub fn apply_decay(&mut self, now_ms: i64) -> bool {
        let elapsed = self.elapsed_days(now_ms);
        if elapsed <= self.decay_count {
            return false;
        }
        if i64::from(elapsed) >= DECAY_CAP_DAYS {
            self.remaining_seconds = 0;
        } else {
            for _ in self.decay_count..elapsed {
                self.remaining_seconds /= 2;
            }
        }
        self.decay_count = elapsed;
        self.last_decay_at = self.created_at + i64::from(elapsed) * DAY_MS;
        true
    }

    /// A spent entry lingers for the rest of its first day, then goes away.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_seconds == 0 && now_ms - self.created_at >= DAY_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_created_at(created_at: i64, seconds: u64) -> CreditEntry {
        CreditEntry::new("e1".to_string(), None, created_at, seconds)
    }

    #[test]
    fn halving_floors_each_day() {
        let mut entry = entry_created_at(0, 100);
        assert!(entry.apply_decay(3 * DAY_MS));
        // 100 -> 50 -> 25 -> 12
        assert_eq!(entry.remaining_seconds, 12);
        assert_eq!(entry.decay_count, 3);
        assert_eq!(entry.last_decay_at, 3 * DAY_MS);
    }

    #[test]
    fn decay_is_idempotent_at_the_same_instant() {
        let mut entry = entry_created_at(0, 100);
        let now = 2 * DAY_MS + 12345;
        assert!(entry.apply_decay(now));
        let snapshot = entry.clone();
        assert!(!entry.apply_decay(now));
        assert_eq!(entry, snapshot);
    }

    #[test]
    fn partial_days_do_not_decay() {
        let mut entry = entry_created_at(0, 100);
        assert!(!entry.apply_decay(DAY_MS - 1));
        assert_eq!(entry.remaining_seconds, 100);
        assert_eq!(entry.decay_count, 0);
    }

    #[test]
    fn thirty_day_cap_forces_zero() {
        let mut entry = entry_created_at(0, u64::MAX / 2);
        assert!(entry.apply_decay(45 * DAY_MS));
        assert_eq!(entry.remaining_seconds, 0);
        assert_eq!(entry.decay_count, DECAY_CAP_DAYS as u32);
    }

    #[test]
    fn clock_moved_backwards_counts_as_zero_elapsed() {
        let mut entry = entry_created_at(5 * DAY_MS, 100);
        assert!(!entry.apply_decay(DAY_MS));
        assert_eq!(entry.remaining_seconds, 100);
        assert_eq!(entry.decay_count, 0);
    }

    #[test]
    fn decay_count_never_decreases() {
        let mut entry = entry_created_at(0, 100);
        entry.apply_decay(4 * DAY_MS);
        assert_eq!(entry.decay_count, 4);
        entry.apply_decay(2 * DAY_MS);
        assert_eq!(entry.decay_count, 4);
    }

    #[test]
    fn same_day_zero_balance_is_retained() {
        let mut entry = entry_created_at(0, 10);
        entry.remaining_seconds = 0;
        assert!(!entry.is_expired(DAY_MS - 1));
        assert!(entry.is_expired(DAY_MS));
    }

    #[test]
    fn positive_balance_never_expires() {
        let entry = entry_created_at(0, 10);
        assert!(!entry.is_expired(10 * DAY_MS));
    }
}
