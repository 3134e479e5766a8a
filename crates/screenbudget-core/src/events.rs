use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorState;

/// Decisions and transitions the monitor hands to external surfaces.
/// The blocking interstitial receives `Blocked`; shells may log or display
/// the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Block decision: budget exhausted (or absent) for a controlled
    /// foreground app.
    Blocked {
        app_id: String,
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    /// A grace exception was consumed; the app is admitted until `until`.
    GraceStarted {
        app_id: String,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Full monitor state snapshot.
    StateSnapshot {
        state: MonitorState,
        foreground: Option<String>,
        at: DateTime<Utc>,
    },
}
