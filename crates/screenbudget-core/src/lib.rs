//! # Screenbudget Core Library
//!
//! This library provides the core business logic for screenbudget: completed
//! exercise becomes a spendable, time-decaying budget of screen time, and an
//! enforcement monitor debits that budget second by second while controlled
//! applications are in the foreground, blocking them once it runs out.
//!
//! ## Architecture
//!
//! - **Credit Ledger**: append-only collection of decaying credit entries.
//!   Every read applies pending daily halvings before computing its view, so
//!   persisted state is reconciled lazily and restarts lose nothing.
//! - **Enforcement Monitor**: a wall-clock-based state machine with no
//!   internal threads. The caller dispatches foreground-change events and
//!   one-second ticks from a single queue.
//! - **Pricing**: pure buy-back discount and penalty arithmetic.
//! - **Storage**: SQLite-backed key/value documents plus TOML configuration.
//!
//! ## Key Components
//!
//! - [`CreditLedger`]: entry lifecycle, decay, FIFO consumption, migration
//! - [`Monitor`]: the blocking state machine over a [`Budget`] source
//! - [`KvStore`]: the injected storage seam (SQLite in production,
//!   [`MemoryStore`] in tests)
//! - [`Config`]: monitor configuration management

pub mod error;
pub mod events;
pub mod ledger;
pub mod monitor;
pub mod pricing;
pub mod storage;
pub mod usage;

pub use error::{ConfigError, CoreError, Result, StorageError};
pub use events::Event;
pub use ledger::{ConsumeOutcome, CreditEntry, CreditLedger, LedgerBreakdown, LedgerTotals};
pub use monitor::{
    AllowanceBudget, Budget, GraceException, Monitor, MonitorInput, MonitorState,
};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use usage::{DailyUsage, UsageState};
