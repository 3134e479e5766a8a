//! Enforcement monitor state machine.
//!
//! The monitor is wall-clock based with no internal threads: the hosting
//! process dispatches [`MonitorInput`] values -- foreground-change events
//! and one-second ticks -- from a single queue, and each handler runs to
//! completion before the next is dispatched.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Watching -> Blocked
//!            \-> Grace -> Blocked (on expiry)
//! ```
//!
//! Budget evaluation goes through the [`Budget`] seam: the credit ledger in
//! the current scheme, or the plain daily-allowance counter. Writes are
//! fire-and-forget; a failed counter write is logged and never turns into a
//! crash or a spurious block.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::events::Event;
use crate::ledger::CreditLedger;
use crate::storage::{self, keys, Config, KvStore};
use crate::usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    /// No controlled app is foregrounded.
    Idle,
    /// A controlled app is foregrounded and budget remains.
    Watching,
    /// A consumed "open anyway" exception is holding a block at bay.
    Grace,
    /// Budget exhausted or absent for the foregrounded controlled app.
    Blocked,
}

/// Inputs delivered to the monitor's single-threaded queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorInput {
    ForegroundChanged { app_id: String },
    Tick,
}

/// Single-use, time-boxed bypass of blocking for one specific app.
///
/// Expiry is an absolute timestamp, so the check stays correct across
/// process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceException {
    pub app_id: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

/// A source of spendable seconds the monitor can evaluate and debit.
pub trait Budget {
    /// Remaining spendable seconds at `now`.
    fn remaining(&mut self, now: DateTime<Utc>) -> u64;

    /// Record `seconds` of foreground use for `app_id` and debit the
    /// budget. Returns the seconds actually covered; a shortfall means the
    /// budget is exhausted.
    fn debit(&mut self, now: DateTime<Utc>, app_id: &str, seconds: u64) -> u64;
}

impl<S: KvStore> Budget for CreditLedger<S> {
    fn remaining(&mut self, now: DateTime<Utc>) -> u64 {
        match self.totals(now) {
            Ok(totals) => totals.total_seconds,
            Err(e) => {
                warn!(error = %e, "ledger totals unavailable; treating budget as exhausted");
                0
            }
        }
    }

    fn debit(&mut self, now: DateTime<Utc>, app_id: &str, seconds: u64) -> u64 {
        // Daily counters are reporting/back-compat, distinct from ledger
        // consumption; both advance on a debit.
        if let Err(e) = usage::record(self.store_mut(), now, app_id, seconds) {
            warn!(error = %e, "failed to record daily usage");
        }
        match self.consume(now, seconds as i64) {
            Ok(outcome) => outcome.consumed_seconds,
            Err(e) => {
                warn!(error = %e, "ledger consume failed; treating budget as exhausted");
                0
            }
        }
    }
}

/// The pre-ledger scheme: a configured daily allowance minus the seconds
/// already used today. The counter itself advances through the same daily
/// usage recording, so debiting only reports how much of the request fit.
pub struct AllowanceBudget<S: KvStore> {
    store: S,
}

impl<S: KvStore> AllowanceBudget<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KvStore> Budget for AllowanceBudget<S> {
    fn remaining(&mut self, now: DateTime<Utc>) -> u64 {
        let used = usage::load(&self.store, now).used_seconds_today;
        usage::allowance_seconds(&self.store).saturating_sub(used)
    }

    fn debit(&mut self, now: DateTime<Utc>, app_id: &str, seconds: u64) -> u64 {
        let before = self.remaining(now);
        if let Err(e) = usage::record(&mut self.store, now, app_id, seconds) {
            warn!(error = %e, "failed to record daily usage");
        }
        seconds.min(before)
    }
}

/// Replace the controlled application set.
pub fn set_controlled_apps<S: KvStore>(store: &mut S, apps: &[String]) -> Result<()> {
    storage::save_json(store, keys::CONTROLLED_APPS, &apps)
}

/// The controlled application set; fail-open to empty.
pub fn controlled_apps<S: KvStore>(store: &S) -> HashSet<String> {
    storage::load_or_default::<Vec<String>, _>(store, keys::CONTROLLED_APPS)
        .into_iter()
        .collect()
}

/// Arm a grace exception: the next zero-budget foreground evaluation for
/// exactly `app_id`, before expiry, is admitted once.
pub fn confirm_open_anyway<S: KvStore>(
    store: &mut S,
    now: DateTime<Utc>,
    app_id: &str,
    window: Duration,
) -> Result<GraceException> {
    let grace = GraceException {
        app_id: app_id.to_string(),
        expires_at: now.timestamp_millis() + window.num_milliseconds(),
    };
    storage::save_json(store, keys::GRACE_EXCEPTION, &grace)?;
    Ok(grace)
}

/// The enforcement monitor.
///
/// `store` holds the controlled-app set and grace exception; `budget` may
/// carry its own store handle (both point at the same database in
/// production). The design assumes a single monitor instance per device.
pub struct Monitor<S: KvStore, B: Budget> {
    store: S,
    budget: B,
    host_app: String,
    grace_window: Duration,
    state: MonitorState,
    foreground: Option<String>,
    /// Absolute expiry (epoch ms) while in `Grace`.
    grace_until: Option<i64>,
}

impl<S: KvStore, B: Budget> Monitor<S, B> {
    pub fn new(store: S, budget: B, config: &Config) -> Self {
        Self {
            store,
            budget,
            host_app: config.host_app.clone(),
            grace_window: Duration::seconds(config.grace_window_secs as i64),
            state: MonitorState::Idle,
            foreground: None,
            grace_until: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn foreground(&self) -> Option<&str> {
        self.foreground.as_deref()
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            state: self.state,
            foreground: self.foreground.clone(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Dispatch one input from the queue.
    pub fn handle(&mut self, now: DateTime<Utc>, input: MonitorInput) -> Option<Event> {
        match input {
            MonitorInput::ForegroundChanged { app_id } => self.on_foreground_changed(now, app_id),
            MonitorInput::Tick => self.on_tick(now),
        }
    }

    /// Arm a grace exception through this monitor's store and window.
    pub fn confirm_open_anyway(
        &mut self,
        now: DateTime<Utc>,
        app_id: &str,
    ) -> Result<GraceException> {
        confirm_open_anyway(&mut self.store, now, app_id, self.grace_window)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn on_foreground_changed(&mut self, now: DateTime<Utc>, app_id: String) -> Option<Event> {
        self.foreground = Some(app_id.clone());
        self.grace_until = None;
        if !self.is_controlled(&app_id) || app_id == self.host_app {
            self.state = MonitorState::Idle;
            return None;
        }
        let remaining = self.budget.remaining(now);
        if remaining > 0 {
            self.state = MonitorState::Watching;
            return None;
        }
        if let Some(grace) = self.take_grace(now.timestamp_millis(), &app_id) {
            self.state = MonitorState::Grace;
            self.grace_until = Some(grace.expires_at);
            return Some(Event::GraceStarted {
                app_id,
                until: DateTime::<Utc>::from_timestamp_millis(grace.expires_at)
                    .unwrap_or(now),
                at: now,
            });
        }
        self.state = MonitorState::Blocked;
        Some(Event::Blocked {
            app_id,
            remaining_seconds: 0,
            at: now,
        })
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let app_id = self.foreground.clone()?;
        if !self.is_controlled(&app_id) || app_id == self.host_app {
            return None;
        }
        // A blocked app is not being used; no debit, and the block decision
        // already fired.
        if self.state == MonitorState::Blocked {
            return None;
        }
        let _covered = self.budget.debit(now, &app_id, 1);
        match self.state {
            MonitorState::Grace => {
                if self
                    .grace_until
                    .is_some_and(|until| now.timestamp_millis() < until)
                {
                    return None;
                }
                self.grace_until = None;
                self.state = MonitorState::Blocked;
                Some(Event::Blocked {
                    app_id,
                    remaining_seconds: 0,
                    at: now,
                })
            }
            _ => {
                let remaining = self.budget.remaining(now);
                if remaining == 0 {
                    self.state = MonitorState::Blocked;
                    Some(Event::Blocked {
                        app_id,
                        remaining_seconds: 0,
                        at: now,
                    })
                } else {
                    self.state = MonitorState::Watching;
                    None
                }
            }
        }
    }

    fn is_controlled(&self, app_id: &str) -> bool {
        controlled_apps(&self.store).contains(app_id)
    }

    /// Consume the armed grace exception for `app_id`, if valid. Single
    /// use: the stored record is removed whether used or expired.
    fn take_grace(&mut self, now_ms: i64, app_id: &str) -> Option<GraceException> {
        let grace: Option<GraceException> =
            storage::load_or_default(&self.store, keys::GRACE_EXCEPTION);
        let grace = grace?;
        if grace.app_id != app_id {
            return None;
        }
        if let Err(e) = self.store.remove(keys::GRACE_EXCEPTION) {
            warn!(error = %e, "failed to clear grace exception");
        }
        if now_ms < grace.expires_at {
            Some(grace)
        } else {
            None
        }
    }
}
