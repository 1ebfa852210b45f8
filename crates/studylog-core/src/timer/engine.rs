//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine over a
//! [`TimerSnapshot`]. It does not read the clock or use threads: every
//! operation takes the current time in epoch milliseconds, and the caller is
//! responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Finished -> Idle (reset)
//! ```
//!
//! While running, the end timestamp is the only authority. Remaining time is
//! derived from it on every tick, so a missed or throttled tick can delay the
//! display but never the countdown.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(25, now);
//! engine.start(now)?;
//! // In a loop:
//! engine.tick(clock.now_ms()); // Returns Some(Event) when the countdown finishes
//! ```

use serde::{Deserialize, Serialize};

use super::clock::datetime_from_ms;
use super::snapshot::{TimerSnapshot, MS_PER_MINUTE};
use crate::error::TimerError;
use crate::events::Event;

/// Longest configurable session.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// A partial session must have run at least this long to be saved.
pub const MIN_SAVE_MS: u64 = MS_PER_MINUTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Configured, full duration remaining.
    Idle,
    Running,
    /// Stopped part way through.
    Paused,
    /// Reached zero. Completion handling is in progress or done.
    Finished,
}

/// Core timer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEngine {
    snapshot: TimerSnapshot,
}

impl TimerEngine {
    /// Create an idle engine with the full duration remaining.
    pub fn new(initial_minutes: u32, now_ms: u64) -> Self {
        Self {
            snapshot: TimerSnapshot::fresh(initial_minutes, now_ms),
        }
    }

    /// Rebuild an engine from persisted state. No time is reconciled here;
    /// call `tick()` with the current time for that.
    pub fn from_snapshot(snapshot: TimerSnapshot) -> Self {
        Self { snapshot }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        let s = &self.snapshot;
        if s.is_running {
            TimerState::Running
        } else if s.finished {
            TimerState::Finished
        } else if s.remaining_ms < s.total_ms() {
            TimerState::Paused
        } else {
            TimerState::Idle
        }
    }

    pub fn snapshot(&self) -> &TimerSnapshot {
        &self.snapshot
    }

    pub fn initial_minutes(&self) -> u32 {
        self.snapshot.initial_minutes
    }

    pub fn total_ms(&self) -> u64 {
        self.snapshot.total_ms()
    }

    /// Remaining time as of the last operation.
    pub fn remaining_ms(&self) -> u64 {
        self.snapshot.remaining_ms
    }

    /// Remaining time at `now_ms`, derived from the end timestamp when running.
    pub fn remaining_at(&self, now_ms: u64) -> u64 {
        match self.running_end() {
            Some(end_at) => end_at.saturating_sub(now_ms),
            None => self.snapshot.remaining_ms,
        }
    }

    pub fn elapsed_at(&self, now_ms: u64) -> u64 {
        self.total_ms().saturating_sub(self.remaining_at(now_ms))
    }

    pub fn is_finished(&self) -> bool {
        self.snapshot.finished
    }

    pub fn is_auto_saved(&self) -> bool {
        self.snapshot.auto_saved
    }

    /// The countdown finished but no completion record is known to be stored.
    pub fn needs_completion(&self) -> bool {
        self.snapshot.finished && !self.snapshot.auto_saved
    }

    /// Build a full state snapshot event.
    pub fn status(&self, now_ms: u64) -> Event {
        let remaining_ms = self.remaining_at(now_ms);
        let total_ms = self.total_ms();
        let progress_pct = if total_ms == 0 {
            0.0
        } else {
            (1.0 - remaining_ms as f64 / total_ms as f64) * 100.0
        };
        Event::StateSnapshot {
            state: self.state(),
            remaining_ms,
            total_ms,
            progress_pct,
            initial_minutes: self.snapshot.initial_minutes,
            finished: self.snapshot.finished,
            auto_saved: self.snapshot.auto_saved,
            end_at: self.running_end().map(datetime_from_ms),
            at: datetime_from_ms(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from idle or resume from paused.
    pub fn start(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        let state = self.state();
        if state == TimerState::Running {
            return Err(TimerError::AlreadyRunning);
        }
        if state == TimerState::Finished || self.snapshot.remaining_ms == 0 {
            return Err(TimerError::NothingRemaining);
        }

        let remaining_ms = self.snapshot.remaining_ms;
        let end_at = now_ms.saturating_add(remaining_ms);
        let s = &mut self.snapshot;
        if state == TimerState::Idle {
            // New lifecycle.
            s.finished = false;
            s.auto_saved = false;
        }
        s.is_running = true;
        s.end_at = Some(end_at);
        s.updated_at = now_ms;

        let at = datetime_from_ms(now_ms);
        Ok(match state {
            TimerState::Paused => Event::TimerResumed {
                remaining_ms,
                end_at: datetime_from_ms(end_at),
                at,
            },
            _ => Event::TimerStarted {
                duration_ms: remaining_ms,
                end_at: datetime_from_ms(end_at),
                at,
            },
        })
    }

    /// Freeze the remaining time. Pausing at or after the end finishes the
    /// countdown instead.
    pub fn pause(&mut self, now_ms: u64) -> Result<Event, TimerError> {
        let end_at = self.running_end().ok_or(TimerError::NotRunning)?;
        if now_ms >= end_at {
            return Ok(self.finish(now_ms));
        }
        let s = &mut self.snapshot;
        s.remaining_ms = end_at - now_ms;
        s.is_running = false;
        s.end_at = None;
        s.updated_at = now_ms;
        Ok(Event::TimerPaused {
            remaining_ms: s.remaining_ms,
            at: datetime_from_ms(now_ms),
        })
    }

    /// Call periodically. Returns `Some(Event::TimerCompleted)` when the
    /// countdown finishes.
    pub fn tick(&mut self, now_ms: u64) -> Option<Event> {
        let end_at = self.running_end()?;
        if now_ms >= end_at {
            return Some(self.finish(now_ms));
        }
        self.snapshot.remaining_ms = end_at - now_ms;
        self.snapshot.updated_at = now_ms;
        None
    }

    /// Back to idle with the full configured duration. Starts a new lifecycle.
    pub fn reset(&mut self, now_ms: u64) -> Event {
        let s = &mut self.snapshot;
        s.remaining_ms = s.total_ms();
        s.is_running = false;
        s.end_at = None;
        s.finished = false;
        s.auto_saved = false;
        s.updated_at = now_ms;
        Event::TimerReset {
            initial_minutes: s.initial_minutes,
            at: datetime_from_ms(now_ms),
        }
    }

    /// New session length from Idle, Paused, or a Finished countdown whose
    /// record is stored. Starts a new lifecycle.
    pub fn change_duration(&mut self, minutes: u32, now_ms: u64) -> Result<Event, TimerError> {
        if self.snapshot.is_running {
            return Err(TimerError::DurationLocked);
        }
        // Starting a new lifecycle would drop the pending record.
        if self.needs_completion() {
            return Err(TimerError::UnrecordedSession);
        }
        if minutes == 0 || minutes > MAX_DURATION_MINUTES {
            return Err(TimerError::InvalidDuration {
                minutes,
                max: MAX_DURATION_MINUTES,
            });
        }
        let s = &mut self.snapshot;
        s.initial_minutes = minutes;
        s.remaining_ms = s.total_ms();
        s.finished = false;
        s.auto_saved = false;
        s.updated_at = now_ms;
        Ok(Event::DurationChanged {
            initial_minutes: minutes,
            at: datetime_from_ms(now_ms),
        })
    }

    /// Whole minutes a save at `now_ms` would record.
    ///
    /// A finished, unsaved countdown records its full duration. A running or
    /// paused one records elapsed time rounded up, once at least
    /// [`MIN_SAVE_MS`] has elapsed.
    pub fn savable_minutes(&self, now_ms: u64) -> Result<u32, TimerError> {
        if self.snapshot.auto_saved {
            return Err(TimerError::AlreadySaved);
        }
        match self.state() {
            TimerState::Idle => Err(TimerError::NothingToSave),
            TimerState::Finished => Ok(self.snapshot.initial_minutes),
            TimerState::Running | TimerState::Paused => {
                let elapsed_ms = self.elapsed_at(now_ms);
                if elapsed_ms < MIN_SAVE_MS {
                    return Err(TimerError::BelowMinimum { elapsed_ms });
                }
                Ok(elapsed_ms.div_ceil(MS_PER_MINUTE) as u32)
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    pub(crate) fn set_auto_saved(&mut self, saved: bool, now_ms: u64) {
        self.snapshot.auto_saved = saved;
        self.snapshot.updated_at = now_ms;
    }

    fn running_end(&self) -> Option<u64> {
        if self.snapshot.is_running {
            self.snapshot.end_at
        } else {
            None
        }
    }

    fn finish(&mut self, now_ms: u64) -> Event {
        let s = &mut self.snapshot;
        s.remaining_ms = 0;
        s.is_running = false;
        s.end_at = None;
        s.finished = true;
        s.updated_at = now_ms;
        Event::TimerCompleted {
            initial_minutes: s.initial_minutes,
            at: datetime_from_ms(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000_000;
    const MIN: u64 = MS_PER_MINUTE;

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::new(25, T0);
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(matches!(engine.start(T0), Ok(Event::TimerStarted { .. })));
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.snapshot().end_at, Some(T0 + 25 * MIN));

        assert!(engine.pause(T0 + MIN).is_ok());
        assert_eq!(engine.state(), TimerState::Paused);
        assert_eq!(engine.remaining_ms(), 24 * MIN);
        assert_eq!(engine.snapshot().end_at, None);

        assert!(matches!(
            engine.start(T0 + 2 * MIN),
            Ok(Event::TimerResumed { .. })
        ));
        assert_eq!(engine.snapshot().end_at, Some(T0 + 26 * MIN));
    }

    #[test]
    fn fifteen_minute_timer_paused_twice() {
        let mut engine = TimerEngine::new(15, T0);
        engine.start(T0).unwrap();
        engine.pause(T0 + 5 * MIN).unwrap();
        let resume_at = T0 + 9 * MIN;
        engine.start(resume_at).unwrap();
        engine.pause(resume_at + 3 * MIN).unwrap();
        assert_eq!(engine.remaining_ms(), 420_000);
    }

    #[test]
    fn start_with_nothing_remaining_is_rejected() {
        let mut engine = TimerEngine::new(1, T0);
        engine.start(T0).unwrap();
        engine.tick(T0 + MIN);
        assert_eq!(engine.state(), TimerState::Finished);
        let before = engine.clone();

        assert_eq!(engine.start(T0 + 2 * MIN), Err(TimerError::NothingRemaining));
        assert_eq!(engine, before);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut engine = TimerEngine::new(5, T0);
        engine.start(T0).unwrap();
        assert_eq!(engine.start(T0 + 10), Err(TimerError::AlreadyRunning));
        assert_eq!(engine.snapshot().end_at, Some(T0 + 5 * MIN));
    }

    #[test]
    fn pause_when_not_running_is_rejected() {
        let mut engine = TimerEngine::new(5, T0);
        assert_eq!(engine.pause(T0), Err(TimerError::NotRunning));
    }

    #[test]
    fn tick_derives_remaining_from_end() {
        let mut engine = TimerEngine::new(10, T0);
        engine.start(T0).unwrap();
        assert!(engine.tick(T0 + 250).is_none());
        assert_eq!(engine.remaining_ms(), 10 * MIN - 250);

        // A long gap between ticks loses nothing.
        assert!(engine.tick(T0 + 7 * MIN).is_none());
        assert_eq!(engine.remaining_ms(), 3 * MIN);
    }

    #[test]
    fn tick_finishes_exactly_at_end() {
        let mut engine = TimerEngine::new(10, T0);
        engine.start(T0).unwrap();
        assert!(engine.tick(T0 + 10 * MIN - 1).is_none());
        let event = engine.tick(T0 + 10 * MIN);
        assert!(matches!(
            event,
            Some(Event::TimerCompleted {
                initial_minutes: 10,
                ..
            })
        ));
        let snap = engine.snapshot();
        assert!(snap.finished && !snap.is_running);
        assert_eq!(snap.end_at, None);
        assert_eq!(snap.remaining_ms, 0);
        assert!(engine.needs_completion());

        // Already finished: nothing more to report.
        assert!(engine.tick(T0 + 11 * MIN).is_none());
    }

    #[test]
    fn pause_after_end_finishes() {
        let mut engine = TimerEngine::new(2, T0);
        engine.start(T0).unwrap();
        let event = engine.pause(T0 + 3 * MIN).unwrap();
        assert!(matches!(event, Event::TimerCompleted { .. }));
        assert_eq!(engine.state(), TimerState::Finished);
    }

    #[test]
    fn reset_restores_fresh_lifecycle() {
        let mut engine = TimerEngine::new(3, T0);
        engine.start(T0).unwrap();
        engine.tick(T0 + 3 * MIN);
        engine.set_auto_saved(true, T0 + 3 * MIN);

        engine.reset(T0 + 4 * MIN);
        let snap = engine.snapshot();
        assert_eq!(engine.state(), TimerState::Idle);
        assert!(!snap.finished && !snap.auto_saved);
        assert_eq!(snap.remaining_ms, 3 * MIN);
        assert_eq!(snap.updated_at, T0 + 4 * MIN);
    }

    #[test]
    fn change_duration_only_when_stopped() {
        let mut engine = TimerEngine::new(25, T0);
        engine.change_duration(50, T0).unwrap();
        assert_eq!(engine.remaining_ms(), 50 * MIN);

        engine.start(T0).unwrap();
        assert_eq!(
            engine.change_duration(10, T0 + 1),
            Err(TimerError::DurationLocked)
        );
        assert_eq!(engine.initial_minutes(), 50);

        engine.pause(T0 + MIN).unwrap();
        engine.change_duration(10, T0 + MIN).unwrap();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_ms(), 10 * MIN);
    }

    #[test]
    fn change_duration_keeps_unrecorded_completion() {
        let mut engine = TimerEngine::new(10, T0);
        engine.start(T0).unwrap();
        engine.tick(T0 + 10 * MIN).unwrap();
        assert!(engine.needs_completion());

        assert_eq!(
            engine.change_duration(25, T0 + 11 * MIN),
            Err(TimerError::UnrecordedSession)
        );
        assert_eq!(engine.initial_minutes(), 10);
        assert!(engine.needs_completion());

        // Once recorded, a new length starts a fresh lifecycle.
        engine.set_auto_saved(true, T0 + 11 * MIN);
        engine.change_duration(25, T0 + 12 * MIN).unwrap();
        assert_eq!(engine.state(), TimerState::Idle);
        assert!(!engine.is_finished() && !engine.is_auto_saved());
    }

    #[test]
    fn change_duration_validates_bounds() {
        let mut engine = TimerEngine::new(25, T0);
        assert!(matches!(
            engine.change_duration(0, T0),
            Err(TimerError::InvalidDuration { minutes: 0, .. })
        ));
        assert!(engine.change_duration(MAX_DURATION_MINUTES + 1, T0).is_err());
        assert!(engine.change_duration(MAX_DURATION_MINUTES, T0).is_ok());
    }

    #[test]
    fn savable_minutes_rounds_up_elapsed() {
        let mut engine = TimerEngine::new(25, T0);
        assert_eq!(engine.savable_minutes(T0), Err(TimerError::NothingToSave));

        engine.start(T0).unwrap();
        assert_eq!(
            engine.savable_minutes(T0 + 59_999),
            Err(TimerError::BelowMinimum { elapsed_ms: 59_999 })
        );
        assert_eq!(engine.savable_minutes(T0 + MIN), Ok(1));
        assert_eq!(engine.savable_minutes(T0 + MIN + 1), Ok(2));

        engine.pause(T0 + 4 * MIN + 30_000).unwrap();
        assert_eq!(engine.savable_minutes(T0 + 60 * MIN), Ok(5));
    }

    #[test]
    fn finished_session_saves_once() {
        let mut engine = TimerEngine::new(10, T0);
        engine.start(T0).unwrap();
        engine.tick(T0 + 10 * MIN);
        assert_eq!(engine.savable_minutes(T0 + 10 * MIN), Ok(10));
        engine.set_auto_saved(true, T0 + 10 * MIN);
        assert_eq!(
            engine.savable_minutes(T0 + 10 * MIN),
            Err(TimerError::AlreadySaved)
        );
    }

    #[test]
    fn status_reports_live_remaining() {
        let mut engine = TimerEngine::new(10, T0);
        engine.start(T0).unwrap();
        match engine.status(T0 + 5 * MIN) {
            Event::StateSnapshot {
                state,
                remaining_ms,
                progress_pct,
                end_at,
                ..
            } => {
                assert_eq!(state, TimerState::Running);
                assert_eq!(remaining_ms, 5 * MIN);
                assert!((progress_pct - 50.0).abs() < f64::EPSILON);
                assert!(end_at.is_some());
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    proptest! {
        /// Time spent running always equals total minus remaining, however
        /// the session is chopped up by pauses and throttled ticks.
        #[test]
        fn no_drift_across_pause_resume(
            segments in prop::collection::vec((1u64..90_000, 0u64..600_000, 0usize..5), 1..20)
        ) {
            let mut engine = TimerEngine::new(60, T0);
            let mut now = T0;
            let mut ran = 0u64;

            for (run_ms, paused_ms, ticks) in segments {
                if engine.state() == TimerState::Finished {
                    break;
                }
                engine.start(now).unwrap();
                for i in 1..=ticks as u64 {
                    engine.tick(now + run_ms * i / (ticks as u64 + 1));
                }
                now += run_ms;
                engine.pause(now).unwrap();
                ran += run_ms;
                prop_assert_eq!(engine.total_ms() - engine.remaining_ms(), ran.min(engine.total_ms()));
                now += paused_ms;
            }
        }
    }
}
