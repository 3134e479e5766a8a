//! The credit ledger: persistent, decaying screen-time credit.
//!
//! Every public operation runs the same pipeline before doing anything
//! else: load persisted entries (fail open), run the one-time legacy
//! migration if it applies, apply pending decay to every entry, prune
//! expired zero-balance entries, and persist when anything changed. Stale
//! state therefore never inflates a view or an update, and a process
//! restart picks up exactly where the last persisted state left off.
//!
//! Consumption order is `(created_at, id)` ascending: the oldest credit is
//! spent first, so recently earned, not-yet-decayed credit survives
//! longest.

mod entry;

pub use entry::{CreditEntry, DECAY_CAP_DAYS};
pub(crate) use entry::DAY_MS;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{self, keys, KvStore};
use crate::usage;

/// Aggregate remaining balance across the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Sum of positive remaining balances.
    pub total_seconds: u64,
    /// Remaining balance summed per sport (legacy credit has no sport).
    pub by_sport: HashMap<String, u64>,
}

/// Remaining balance relative to the trailing 24-hour window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBreakdown {
    /// Seconds earned by entries created within the window.
    pub total_today_seconds: u64,
    /// Remaining balance carried over from entries created before the window.
    pub carryover_seconds: u64,
    /// Remaining balance of entries created within the window.
    pub remaining_seconds: u64,
}

/// Result of a consumption: how much was actually spent and what is left.
///
/// `consumed_seconds` may fall short of the request; callers treat the
/// shortfall as "budget exhausted", never as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub remaining_seconds: u64,
    pub consumed_seconds: u64,
}

/// Pre-ledger single-counter allowance, kept only to migrate old installs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyAllowance {
    #[serde(default)]
    seconds: u64,
    #[serde(default)]
    last_day: String,
}

/// The persistent credit ledger over an injected document store.
pub struct CreditLedger<S: KvStore> {
    store: S,
}

impl<S: KvStore> CreditLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a mutable reference to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create or update the entry for a reported exercise.
    ///
    /// A non-positive `total_seconds` removes the entry instead. On update,
    /// `original_seconds` follows the new value and the remaining balance
    /// is clamped down to it -- remaining never increases on update. A
    /// blank id is a no-op.
    pub fn upsert(
        &mut self,
        now: DateTime<Utc>,
        entry_id: &str,
        sport_id: Option<&str>,
        created_at: i64,
        total_seconds: i64,
    ) -> Result<()> {
        let entry_id = entry_id.trim();
        if entry_id.is_empty() {
            return Ok(());
        }
        let mut entries = self.reconcile(now.timestamp_millis())?;
        if total_seconds <= 0 {
            let before = entries.len();
            entries.retain(|e| e.id != entry_id);
            if entries.len() != before {
                self.save_entries(&entries)?;
            }
            return Ok(());
        }
        let total = total_seconds as u64;
        match entries.iter_mut().find(|e| e.id == entry_id) {
            Some(existing) => {
                existing.original_seconds = total;
                existing.remaining_seconds = existing.remaining_seconds.min(total);
            }
            None => entries.push(CreditEntry::new(
                entry_id.to_string(),
                sport_id.map(str::to_string),
                created_at,
                total,
            )),
        }
        self.save_entries(&entries)
    }

    /// Delete the entry for a removed exercise; no-op when absent.
    pub fn remove(&mut self, now: DateTime<Utc>, entry_id: &str) -> Result<()> {
        let mut entries = self.reconcile(now.timestamp_millis())?;
        let before = entries.len();
        entries.retain(|e| e.id != entry_id);
        if entries.len() != before {
            self.save_entries(&entries)?;
        }
        Ok(())
    }

    /// Delete all entries and zero the legacy counter.
    pub fn clear_all(&mut self) -> Result<()> {
        self.store.remove(keys::LEDGER_ENTRIES)?;
        self.store.remove(keys::LEGACY_ALLOWANCE)?;
        Ok(())
    }

    /// Delete every entry earned by `sport_id`; no-op when none match.
    pub fn clear_for_sport(&mut self, now: DateTime<Utc>, sport_id: &str) -> Result<()> {
        let mut entries = self.reconcile(now.timestamp_millis())?;
        let before = entries.len();
        entries.retain(|e| e.sport_id.as_deref() != Some(sport_id));
        if entries.len() != before {
            self.save_entries(&entries)?;
        }
        Ok(())
    }

    /// Spend up to `seconds` from the ledger, oldest credit first.
    pub fn consume(&mut self, now: DateTime<Utc>, seconds: i64) -> Result<ConsumeOutcome> {
        let now_ms = now.timestamp_millis();
        let mut entries = self.reconcile(now_ms)?;
        let total: u64 = entries.iter().map(|e| e.remaining_seconds).sum();
        if seconds <= 0 {
            return Ok(ConsumeOutcome {
                remaining_seconds: total,
                consumed_seconds: 0,
            });
        }
        entries.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        let mut wanted = seconds as u64;
        let mut consumed = 0u64;
        for entry in entries.iter_mut() {
            if wanted == 0 {
                break;
            }
            let take = entry.remaining_seconds.min(wanted);
            entry.remaining_seconds -= take;
            consumed += take;
            wanted -= take;
        }
        entries.retain(|e| !e.is_expired(now_ms));
        self.save_entries(&entries)?;
        Ok(ConsumeOutcome {
            remaining_seconds: total - consumed,
            consumed_seconds: consumed,
        })
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Total remaining balance plus a per-sport breakdown.
    pub fn totals(&mut self, now: DateTime<Utc>) -> Result<LedgerTotals> {
        let entries = self.reconcile(now.timestamp_millis())?;
        let mut totals = LedgerTotals::default();
        for entry in &entries {
            if entry.remaining_seconds == 0 {
                continue;
            }
            totals.total_seconds += entry.remaining_seconds;
            if let Some(sport) = &entry.sport_id {
                *totals.by_sport.entry(sport.clone()).or_insert(0) += entry.remaining_seconds;
            }
        }
        Ok(totals)
    }

    /// Balance relative to the trailing 24-hour window `[now - 1 day, now]`.
    pub fn breakdown(&mut self, now: DateTime<Utc>) -> Result<LedgerBreakdown> {
        let now_ms = now.timestamp_millis();
        let entries = self.reconcile(now_ms)?;
        let window_start = now_ms - DAY_MS;
        let mut view = LedgerBreakdown::default();
        for entry in &entries {
            if entry.created_at >= window_start {
                view.total_today_seconds += entry.original_seconds;
                view.remaining_seconds += entry.remaining_seconds;
            } else {
                view.carryover_seconds += entry.remaining_seconds;
            }
        }
        Ok(view)
    }

    /// All live entries, most recent first, for display.
    pub fn entries(&mut self, now: DateTime<Utc>) -> Result<Vec<CreditEntry>> {
        let mut entries = self.reconcile(now.timestamp_millis())?;
        entries.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(entries)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Load, migrate, decay, prune, and persist-if-changed.
    fn reconcile(&mut self, now_ms: i64) -> Result<Vec<CreditEntry>> {
        let mut entries = self.load_entries();
        let mut changed = false;

        // One-time migration from the pre-ledger allowance counter: only
        // when the ledger has never held an entry and the counter is still
        // positive. Whatever was already used today is not re-granted.
        let mut legacy: LegacyAllowance = storage::load_or_default(&self.store, keys::LEGACY_ALLOWANCE);
        if entries.is_empty() && legacy.seconds > 0 {
            let granted = legacy.seconds.saturating_sub(usage::used_today(&self.store, now_ms));
            if granted > 0 {
                entries.push(CreditEntry::new(
                    Uuid::new_v4().to_string(),
                    None,
                    now_ms,
                    granted,
                ));
            }
            legacy.seconds = 0;
            storage::save_json(&mut self.store, keys::LEGACY_ALLOWANCE, &legacy)?;
            changed = true;
        }

        for entry in entries.iter_mut() {
            changed |= entry.apply_decay(now_ms);
        }
        let before = entries.len();
        entries.retain(|e| !e.is_expired(now_ms));
        changed |= entries.len() != before;

        if changed {
            self.save_entries(&entries)?;
        }
        Ok(entries)
    }

    fn load_entries(&self) -> Vec<CreditEntry> {
        storage::load_or_default(&self.store, keys::LEDGER_ENTRIES)
    }

    fn save_entries(&mut self, entries: &[CreditEntry]) -> Result<()> {
        storage::save_json(&mut self.store, keys::LEDGER_ENTRIES, &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::usage::DailyUsage;
    use proptest::prelude::*;

    fn ledger() -> CreditLedger<MemoryStore> {
        CreditLedger::new(MemoryStore::new())
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn upsert_creates_fresh_entry() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "e1", Some("run"), 1_000_000, 300).unwrap();
        let entries = ledger.entries(now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].original_seconds, 300);
        assert_eq!(entries[0].remaining_seconds, 300);
        assert_eq!(entries[0].sport_id.as_deref(), Some("run"));
        assert_eq!(entries[0].decay_count, 0);
        assert_eq!(entries[0].last_decay_at, 1_000_000);
    }

    #[test]
    fn upsert_never_raises_remaining() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "e1", None, 1_000_000, 100).unwrap();
        ledger.consume(now, 30).unwrap();
        // Shrinking the original clamps the remaining balance down.
        ledger.upsert(now, "e1", None, 1_000_000, 50).unwrap();
        let entries = ledger.entries(now).unwrap();
        assert_eq!(entries[0].original_seconds, 50);
        assert_eq!(entries[0].remaining_seconds, 50);
        // Growing the original leaves the remaining balance alone.
        ledger.upsert(now, "e1", None, 1_000_000, 200).unwrap();
        let entries = ledger.entries(now).unwrap();
        assert_eq!(entries[0].original_seconds, 200);
        assert_eq!(entries[0].remaining_seconds, 50);
    }

    #[test]
    fn remaining_never_exceeds_original() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        for (id, secs) in [("a", 10), ("a", 5), ("a", 25), ("b", 7), ("b", 3)] {
            ledger.upsert(now, id, None, 1_000_000, secs).unwrap();
            for entry in ledger.entries(now).unwrap() {
                assert!(entry.remaining_seconds <= entry.original_seconds);
            }
        }
    }

    #[test]
    fn upsert_with_non_positive_seconds_removes() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "e1", None, 1_000_000, 100).unwrap();
        ledger.upsert(now, "e1", None, 1_000_000, 0).unwrap();
        assert!(ledger.entries(now).unwrap().is_empty());
        // Idempotent when the entry is already gone.
        ledger.upsert(now, "e1", None, 1_000_000, -5).unwrap();
        assert!(ledger.entries(now).unwrap().is_empty());
    }

    #[test]
    fn blank_id_is_a_no_op() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "  ", None, 1_000_000, 100).unwrap();
        assert!(ledger.entries(now).unwrap().is_empty());
    }

    #[test]
    fn consume_spends_oldest_first() {
        let mut ledger = ledger();
        let now = at(10_000_000);
        ledger.upsert(now, "t2", None, 2_000_000, 10).unwrap();
        ledger.upsert(now, "t1", None, 1_000_000, 10).unwrap();
        let outcome = ledger.consume(now, 15).unwrap();
        assert_eq!(outcome.consumed_seconds, 15);
        assert_eq!(outcome.remaining_seconds, 5);
        let entries = ledger.entries(now).unwrap();
        let t1 = entries.iter().find(|e| e.id == "t1").unwrap();
        let t2 = entries.iter().find(|e| e.id == "t2").unwrap();
        assert_eq!(t1.remaining_seconds, 0);
        assert_eq!(t2.remaining_seconds, 5);
    }

    #[test]
    fn consume_reports_shortfall_without_error() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "e1", None, 1_000_000, 10).unwrap();
        let outcome = ledger.consume(now, 100).unwrap();
        assert_eq!(outcome.consumed_seconds, 10);
        assert_eq!(outcome.remaining_seconds, 0);
    }

    #[test]
    fn consume_non_positive_is_a_read() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "e1", None, 1_000_000, 10).unwrap();
        let outcome = ledger.consume(now, 0).unwrap();
        assert_eq!(outcome.consumed_seconds, 0);
        assert_eq!(outcome.remaining_seconds, 10);
    }

    #[test]
    fn decay_halves_once_per_missed_day() {
        let mut ledger = ledger();
        let created = 1_000_000;
        ledger.upsert(at(created), "e1", None, created, 100).unwrap();
        let later = at(created + 3 * DAY_MS);
        assert_eq!(ledger.totals(later).unwrap().total_seconds, 12);
        // A second read at the same instant changes nothing.
        assert_eq!(ledger.totals(later).unwrap().total_seconds, 12);
    }

    #[test]
    fn entries_past_the_cap_read_zero_and_vanish() {
        let mut ledger = ledger();
        let created = 1_000_000;
        ledger
            .upsert(at(created), "e1", None, created, 1_000_000_000)
            .unwrap();
        let later = at(created + 31 * DAY_MS);
        assert_eq!(ledger.totals(later).unwrap().total_seconds, 0);
        assert!(ledger.entries(later).unwrap().is_empty());
    }

    #[test]
    fn spent_entry_lingers_for_its_first_day() {
        let mut ledger = ledger();
        let created = 1_000_000;
        let now = at(created);
        ledger.upsert(now, "e1", None, created, 10).unwrap();
        ledger.consume(now, 10).unwrap();
        // Still listed for the rest of the day...
        let same_day = at(created + DAY_MS - 1);
        assert_eq!(ledger.entries(same_day).unwrap().len(), 1);
        // ...gone once a full day has passed.
        let next_day = at(created + DAY_MS);
        assert!(ledger.entries(next_day).unwrap().is_empty());
    }

    #[test]
    fn totals_split_by_sport() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "a", Some("run"), 1_000_000, 100).unwrap();
        ledger.upsert(now, "b", Some("run"), 1_000_000, 50).unwrap();
        ledger.upsert(now, "c", Some("swim"), 1_000_000, 25).unwrap();
        let totals = ledger.totals(now).unwrap();
        assert_eq!(totals.total_seconds, 175);
        assert_eq!(totals.by_sport["run"], 150);
        assert_eq!(totals.by_sport["swim"], 25);
    }

    #[test]
    fn breakdown_separates_carryover_from_today() {
        let mut ledger = ledger();
        let base = 10 * DAY_MS;
        let now = at(base);
        // Created two days ago with 40s: halves twice to 10s of carryover.
        ledger.upsert(now, "old", None, base - 2 * DAY_MS, 40).unwrap();
        // Created an hour ago with 100s, 30 already spent.
        ledger
            .upsert(now, "new", None, base - 3_600_000, 100)
            .unwrap();
        ledger.consume(now, 30).unwrap(); // Drains the older entry first: 10, then 20 of "new".
        let view = ledger.breakdown(now).unwrap();
        assert_eq!(view.total_today_seconds, 100);
        assert_eq!(view.carryover_seconds, 0);
        assert_eq!(view.remaining_seconds, 80);
    }

    #[test]
    fn breakdown_keeps_unspent_carryover() {
        let mut ledger = ledger();
        let base = 10 * DAY_MS;
        let now = at(base);
        ledger.upsert(now, "old", None, base - 2 * DAY_MS, 40).unwrap();
        ledger.upsert(now, "new", None, base - 3_600_000, 100).unwrap();
        let view = ledger.breakdown(now).unwrap();
        assert_eq!(view.total_today_seconds, 100);
        assert_eq!(view.carryover_seconds, 10);
        assert_eq!(view.remaining_seconds, 100);
    }

    #[test]
    fn entries_listed_most_recent_first() {
        let mut ledger = ledger();
        let now = at(10_000_000);
        ledger.upsert(now, "a", None, 1_000_000, 10).unwrap();
        ledger.upsert(now, "b", None, 3_000_000, 10).unwrap();
        ledger.upsert(now, "c", None, 2_000_000, 10).unwrap();
        let ids: Vec<_> = ledger
            .entries(now)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn remove_and_clear_for_sport() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger.upsert(now, "a", Some("run"), 1_000_000, 10).unwrap();
        ledger.upsert(now, "b", Some("swim"), 1_000_000, 10).unwrap();
        ledger.upsert(now, "c", Some("run"), 1_000_000, 10).unwrap();
        ledger.remove(now, "b").unwrap();
        ledger.remove(now, "nope").unwrap();
        ledger.clear_for_sport(now, "run").unwrap();
        assert!(ledger.entries(now).unwrap().is_empty());
    }

    #[test]
    fn legacy_migration_runs_at_most_once() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        storage::save_json(
            ledger.store_mut(),
            keys::LEGACY_ALLOWANCE,
            &LegacyAllowance {
                seconds: 600,
                last_day: "2020-01-01".to_string(),
            },
        )
        .unwrap();
        let totals = ledger.totals(now).unwrap();
        assert_eq!(totals.total_seconds, 600);
        let entries = ledger.entries(now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].original_seconds, 600);
        assert!(entries[0].sport_id.is_none());
        // Queried again: still one entry, counter stays zeroed.
        assert_eq!(ledger.entries(now).unwrap().len(), 1);
        let legacy: LegacyAllowance =
            storage::load_or_default(ledger.store(), keys::LEGACY_ALLOWANCE);
        assert_eq!(legacy.seconds, 0);
    }

    #[test]
    fn legacy_migration_subtracts_seconds_used_today() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        storage::save_json(
            ledger.store_mut(),
            keys::LEGACY_ALLOWANCE,
            &LegacyAllowance {
                seconds: 600,
                last_day: String::new(),
            },
        )
        .unwrap();
        let mut used = DailyUsage::default();
        used.used_seconds_today = 100;
        used.last_day = crate::usage::day_key(now);
        storage::save_json(ledger.store_mut(), keys::DAILY_USAGE, &used).unwrap();
        assert_eq!(ledger.totals(now).unwrap().total_seconds, 500);
    }

    #[test]
    fn clear_all_zeroes_the_legacy_counter() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        storage::save_json(
            ledger.store_mut(),
            keys::LEGACY_ALLOWANCE,
            &LegacyAllowance {
                seconds: 600,
                last_day: String::new(),
            },
        )
        .unwrap();
        ledger.clear_all().unwrap();
        assert_eq!(ledger.totals(now).unwrap().total_seconds, 0);
        assert!(ledger.entries(now).unwrap().is_empty());
    }

    #[test]
    fn corrupt_entries_document_reads_as_empty() {
        let mut ledger = ledger();
        let now = at(1_000_000);
        ledger
            .store_mut()
            .set(keys::LEDGER_ENTRIES, "definitely { not json")
            .unwrap();
        assert_eq!(ledger.totals(now).unwrap().total_seconds, 0);
        // And the next write leaves the store parseable again.
        ledger.upsert(now, "e1", None, 1_000_000, 10).unwrap();
        assert_eq!(ledger.totals(now).unwrap().total_seconds, 10);
    }

    proptest! {
        #[test]
        fn consume_never_over_reports(
            amounts in prop::collection::vec(0i64..5_000, 0..8),
            demand in -100i64..20_000,
        ) {
            let mut ledger = ledger();
            let now = at(100_000_000);
            for (i, amount) in amounts.iter().enumerate() {
                ledger
                    .upsert(now, &format!("e{i}"), None, 100_000_000 - i as i64 * 1_000, *amount)
                    .unwrap();
            }
            let before = ledger.totals(now).unwrap().total_seconds;
            let outcome = ledger.consume(now, demand).unwrap();
            prop_assert!(outcome.consumed_seconds <= demand.max(0) as u64);
            prop_assert!(outcome.consumed_seconds <= before);
            prop_assert_eq!(outcome.remaining_seconds, before - outcome.consumed_seconds);
        }
    }
}
