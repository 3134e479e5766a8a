//! Daily usage counters and day rollover.
//!
//! These counters exist for reporting and back-compat: they track how many
//! seconds of controlled foreground time were observed today, in total and
//! per app, keyed by a stored `YYYY-MM-DD` day marker (UTC). They are
//! distinct from ledger consumption. All rollover logic goes through
//! [`rollover_if_needed`] so date comparison lives in exactly one place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{self, keys, KvStore};

/// Counters for the current day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    #[serde(default)]
    pub used_seconds_today: u64,
    #[serde(default)]
    pub used_seconds_by_app: HashMap<String, u64>,
    #[serde(default)]
    pub last_day: String,
}

/// Read-only snapshot for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageState {
    pub allowance_seconds: u64,
    pub used_seconds: u64,
    pub day: String,
}

/// The `YYYY-MM-DD` (UTC) marker for `now`.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn day_key_ms(now_ms: i64) -> String {
    day_key(DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_default())
}

/// Reset the counters when the stored day marker differs from `today`.
pub fn rollover_if_needed(usage: DailyUsage, today: &str) -> DailyUsage {
    if usage.last_day == today {
        usage
    } else {
        DailyUsage {
            last_day: today.to_string(),
            ..DailyUsage::default()
        }
    }
}

/// Load today's counters (fail-open, rollover applied).
pub fn load<S: KvStore>(store: &S, now: DateTime<Utc>) -> DailyUsage {
    rollover_if_needed(
        storage::load_or_default(store, keys::DAILY_USAGE),
        &day_key(now),
    )
}

/// Seconds of controlled foreground time already observed today.
pub(crate) fn used_today<S: KvStore>(store: &S, now_ms: i64) -> u64 {
    let usage: DailyUsage = storage::load_or_default(store, keys::DAILY_USAGE);
    rollover_if_needed(usage, &day_key_ms(now_ms)).used_seconds_today
}

/// Record `seconds` of foreground use for `app_id`, rolling the day over
/// first when needed.
pub fn record<S: KvStore>(
    store: &mut S,
    now: DateTime<Utc>,
    app_id: &str,
    seconds: u64,
) -> Result<DailyUsage> {
    let mut usage = load(store, now);
    usage.used_seconds_today += seconds;
    *usage
        .used_seconds_by_app
        .entry(app_id.to_string())
        .or_insert(0) += seconds;
    storage::save_json(store, keys::DAILY_USAGE, &usage)?;
    Ok(usage)
}

/// The configured daily allowance; absent reads as zero.
pub fn allowance_seconds<S: KvStore>(store: &S) -> u64 {
    storage::load_or_default(store, keys::ALLOWANCE_SECONDS)
}

/// Push the configured daily allowance into the store.
pub fn set_allowance_seconds<S: KvStore>(store: &mut S, seconds: u64) -> Result<()> {
    storage::save_json(store, keys::ALLOWANCE_SECONDS, &seconds)
}

/// Snapshot of allowance, usage and day marker for display.
pub fn snapshot<S: KvStore>(store: &S, now: DateTime<Utc>) -> UsageState {
    let usage = load(store, now);
    UsageState {
        allowance_seconds: allowance_seconds(store),
        used_seconds: usage.used_seconds_today,
        day: day_key(now),
    }
}
