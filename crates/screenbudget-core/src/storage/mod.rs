//! Storage layer: key/value documents and configuration.
//!
//! All persistent ledger and monitor state lives in named JSON documents
//! behind the [`KvStore`] trait. Production code uses the SQLite-backed
//! [`Database`]; tests inject an in-memory [`MemoryStore`]. Reads fail open:
//! a missing, unreadable, or corrupt document is treated as fresh state so
//! a damaged store can never crash or hard-block the device.

mod config;
pub mod database;

pub use config::Config;
pub use database::Database;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CoreError, StorageError};

/// Well-known document keys.
pub mod keys {
    /// The credit entry collection (`Vec<CreditEntry>` as JSON).
    pub const LEDGER_ENTRIES: &str = "ledger.entries";
    /// Pre-ledger allowance counter, retained only for one-time migration.
    pub const LEGACY_ALLOWANCE: &str = "ledger.legacy_allowance";
    /// Daily usage counters (`DailyUsage` as JSON).
    pub const DAILY_USAGE: &str = "usage.daily";
    /// Configured daily allowance in seconds.
    pub const ALLOWANCE_SECONDS: &str = "settings.allowance_seconds";
    /// The set of controlled application identifiers.
    pub const CONTROLLED_APPS: &str = "settings.controlled_apps";
    /// Armed "open anyway" exception (`GraceException` as JSON).
    pub const GRACE_EXCEPTION: &str = "monitor.grace";
}

/// Key/value storage over named documents.
///
/// Ledger and monitor operations take this dependency explicitly instead of
/// reaching for process-wide state, which keeps them deterministic under
/// test.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }
}

/// Read and parse a JSON document, treating missing, unreadable, or corrupt
/// state as the default value ("fail open on read").
pub fn load_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KvStore + ?Sized,
{
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key, error = %e, "corrupt document; falling back to default");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "unreadable document; falling back to default");
            T::default()
        }
    }
}

/// Serialize a value to JSON and write it under `key`.
pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), CoreError>
where
    T: Serialize,
    S: KvStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)?;
    Ok(())
}

/// Returns `~/.config/screenbudget[-dev]/` based on SCREENBUDGET_ENV.
///
/// Set SCREENBUDGET_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SCREENBUDGET_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("screenbudget-dev")
    } else {
        base_dir.join("screenbudget")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
