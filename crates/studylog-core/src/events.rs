use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerState;

/// Every timer state change produces an Event.
/// The CLI prints them; the watch loop renders from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_ms: u64,
        end_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        end_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero, either on a tick or while the process
    /// was away.
    TimerCompleted {
        initial_minutes: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        initial_minutes: u32,
        at: DateTime<Utc>,
    },
    DurationChanged {
        initial_minutes: u32,
        at: DateTime<Utc>,
    },
    SessionRecorded {
        name: String,
        category: String,
        duration_minutes: u32,
        /// True when written by completion handling rather than a manual save.
        auto: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        remaining_ms: u64,
        total_ms: u64,
        progress_pct: f64,
        initial_minutes: u32,
        finished: bool,
        auto_saved: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        end_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "TimerStarted",
            Event::TimerPaused { .. } => "TimerPaused",
            Event::TimerResumed { .. } => "TimerResumed",
            Event::TimerCompleted { .. } => "TimerCompleted",
            Event::TimerReset { .. } => "TimerReset",
            Event::DurationChanged { .. } => "DurationChanged",
            Event::SessionRecorded { .. } => "SessionRecorded",
            Event::StateSnapshot { .. } => "StateSnapshot",
        }
    }
}
