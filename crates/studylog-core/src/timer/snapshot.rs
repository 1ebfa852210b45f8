//! Persisted timer state.
//!
//! The snapshot is the only thing that survives a process exit. It holds an
//! absolute end timestamp while running, so elapsed time can always be
//! recovered from the wall clock no matter how long the process was gone.

use serde::{Deserialize, Serialize};

/// Bump when the stored shape changes. Records with another version are
/// discarded on load.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

pub const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub schema_version: u32,
    pub is_running: bool,
    /// Epoch ms at which the countdown hits zero. Only set while running.
    #[serde(default)]
    pub end_at: Option<u64>,
    /// Authoritative while paused; display-only while running.
    pub remaining_ms: u64,
    pub initial_minutes: u32,
    pub finished: bool,
    pub auto_saved: bool,
    pub updated_at: u64,
}

impl TimerSnapshot {
    /// A fresh idle snapshot with the full duration remaining.
    pub fn fresh(initial_minutes: u32, now_ms: u64) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            is_running: false,
            end_at: None,
            remaining_ms: u64::from(initial_minutes) * MS_PER_MINUTE,
            initial_minutes,
            finished: false,
            auto_saved: false,
            updated_at: now_ms,
        }
    }

    pub fn total_ms(&self) -> u64 {
        u64::from(self.initial_minutes) * MS_PER_MINUTE
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored snapshot.
    ///
    /// Returns `None` for anything that is not a consistent snapshot of the
    /// current schema version.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;
        let version = value.get("schema_version")?.as_u64()?;
        if version != u64::from(SNAPSHOT_SCHEMA_VERSION) {
            return None;
        }
        let snapshot: TimerSnapshot = serde_json::from_value(value).ok()?;
        snapshot.is_consistent().then_some(snapshot)
    }

    /// Running implies an end timestamp and vice versa.
    pub fn is_consistent(&self) -> bool {
        self.initial_minutes > 0 && self.is_running == self.end_at.is_some()
    }
}
