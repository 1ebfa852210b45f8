//! One timer session wired to its collaborators.
//!
//! The controller owns a [`TimerEngine`] and the capabilities around it: the
//! snapshot store, the session recorder, the completion notifier and the
//! clock. It persists after every transition and runs completion handling at
//! most once per lifecycle, no matter how often the process is reloaded or
//! `reconcile()` is called.
//!
//! Typical use from a short-lived process:
//!
//! ```ignore
//! let mut timer = TimerController::open(store, recorder, notifier, SystemClock, options)?;
//! timer.reconcile().await?; // catch up with whatever happened while away
//! timer.pause()?;
//! ```

use tracing::{debug, info, warn};

use super::clock::{datetime_from_ms, Clock};
use super::engine::{TimerEngine, TimerState};
use crate::error::{CoreError, Result, TimerError};
use crate::events::Event;
use crate::notify::Notifier;
use crate::recorder::{NewSession, RecordDefaults, SessionRecorder, SessionTag};
use crate::storage::SnapshotStore;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub user_id: String,
    /// Session length used when no snapshot exists yet.
    pub default_minutes: u32,
    pub defaults: RecordDefaults,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            user_id: "local".into(),
            default_minutes: 25,
            defaults: RecordDefaults::default(),
        }
    }
}

pub struct TimerController<S, R, N, C> {
    engine: TimerEngine,
    store: S,
    recorder: R,
    notifier: N,
    clock: C,
    options: ControllerOptions,
    tag: SessionTag,
}

impl<S, R, N, C> TimerController<S, R, N, C>
where
    S: SnapshotStore,
    R: SessionRecorder,
    N: Notifier,
    C: Clock,
{
    /// Load the last snapshot, or start a fresh idle timer if there is none
    /// usable. Time is not reconciled yet; call [`reconcile`](Self::reconcile).
    pub fn open(store: S, recorder: R, notifier: N, clock: C, options: ControllerOptions) -> Result<Self> {
        let engine = match store.load()? {
            Some(snapshot) => TimerEngine::from_snapshot(snapshot),
            None => {
                let engine = TimerEngine::new(options.default_minutes, clock.now_ms());
                store.save(engine.snapshot())?;
                info!(
                    user_id = %options.user_id,
                    minutes = options.default_minutes,
                    "initialized fresh timer"
                );
                engine
            }
        };
        Ok(Self {
            engine,
            store,
            recorder,
            notifier,
            clock,
            options,
            tag: SessionTag::default(),
        })
    }

    pub fn with_tag(mut self, tag: SessionTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn set_tag(&mut self, tag: SessionTag) {
        self.tag = tag;
    }

    pub fn tag(&self) -> &SessionTag {
        &self.tag
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn state(&self) -> TimerState {
        self.engine.state()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn status(&self) -> Event {
        self.engine.status(self.clock.now_ms())
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Bring the timer up to date with the wall clock.
    ///
    /// Call after loading and on every display tick. If the countdown ended
    /// while nobody was watching, or ended earlier without its record being
    /// stored, completion handling runs here.
    ///
    /// # Errors
    /// Storage failures, and [`CoreError::Submission`] if the completion
    /// record could not be written. The timer stays finished in that case.
    pub async fn reconcile(&mut self) -> Result<Vec<Event>> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        if self.engine.state() == TimerState::Running {
            if let Some(event) = self.engine.tick(now) {
                info!(minutes = self.engine.initial_minutes(), "countdown finished");
                events.push(event);
            }
            self.persist()?;
        }

        if self.engine.needs_completion() {
            events.extend(self.complete().await?);
        }
        Ok(events)
    }

    /// Display refresh. Same as [`reconcile`](Self::reconcile): the display
    /// value is always derived from the end timestamp.
    pub async fn tick(&mut self) -> Result<Vec<Event>> {
        self.reconcile().await
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from idle or resume from paused.
    pub fn start(&mut self) -> Result<Event> {
        let event = self.engine.start(self.clock.now_ms())?;
        self.persist()?;
        info!(
            remaining_ms = self.engine.remaining_ms(),
            "timer {}",
            if matches!(event, Event::TimerResumed { .. }) { "resumed" } else { "started" }
        );
        Ok(event)
    }

    /// Freeze the countdown. If the end has already passed this finishes it
    /// instead; run [`reconcile`](Self::reconcile) afterwards to record it.
    pub fn pause(&mut self) -> Result<Event> {
        let event = self.engine.pause(self.clock.now_ms())?;
        self.persist()?;
        info!(remaining_ms = self.engine.remaining_ms(), "timer paused");
        Ok(event)
    }

    pub fn reset(&mut self) -> Result<Event> {
        let event = self.engine.reset(self.clock.now_ms());
        self.persist()?;
        info!(minutes = self.engine.initial_minutes(), "timer reset");
        Ok(event)
    }

    pub fn change_duration(&mut self, minutes: u32) -> Result<Event> {
        let event = self.engine.change_duration(minutes, self.clock.now_ms())?;
        self.persist()?;
        info!(minutes, "duration changed");
        Ok(event)
    }

    /// Manual save.
    ///
    /// A running or paused session records its elapsed time (rounded up to
    /// whole minutes, at least one minute) and then resets. A finished
    /// session whose automatic record failed records its full duration and
    /// stays finished.
    pub async fn save(&mut self) -> Result<Vec<Event>> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        if let Some(event) = self.engine.tick(now) {
            events.push(event);
            self.persist()?;
        }

        let minutes = self.engine.savable_minutes(now)?;
        match self.engine.state() {
            TimerState::Finished => {
                if self.adopt_stored_completion()? {
                    return Err(TimerError::AlreadySaved.into());
                }
                self.mark_auto_saved(true)?;
                events.push(self.submit_guarded(minutes, false).await?);
            }
            _ => {
                let session = self.new_session(minutes, now);
                self.recorder
                    .submit(&session)
                    .await
                    .map_err(CoreError::submission)?;
                info!(minutes, "partial session recorded");
                events.push(recorded_event(&session, false));
                events.push(self.reset()?);
            }
        }
        Ok(events)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist(&self) -> Result<()> {
        self.store.save(self.engine.snapshot())
    }

    fn mark_auto_saved(&mut self, saved: bool) -> Result<()> {
        self.engine.set_auto_saved(saved, self.clock.now_ms());
        self.persist()
    }

    /// Another observer of the same session may have recorded it already.
    /// If the stored snapshot says so, take it over.
    fn adopt_stored_completion(&mut self) -> Result<bool> {
        match self.store.load()? {
            Some(stored)
                if stored.finished
                    && stored.auto_saved
                    && stored.initial_minutes == self.engine.initial_minutes() =>
            {
                debug!("completion already recorded by another instance");
                self.engine = TimerEngine::from_snapshot(stored);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Exactly-once completion handling. The engine has already set
    /// `finished`.
    async fn complete(&mut self) -> Result<Vec<Event>> {
        if self.adopt_stored_completion()? {
            return Ok(Vec::new());
        }
        let minutes = self.engine.initial_minutes();
        if let Err(e) = self.notifier.notify(
            "Study session complete",
            &format!("{minutes} minute session finished"),
        ) {
            debug!(error = %e, "completion notification failed");
        }

        // Claim the record only once nothing but the submit is left, and
        // before its await point.
        self.mark_auto_saved(true)?;
        Ok(vec![self.submit_guarded(minutes, true).await?])
    }

    /// Submit with `auto_saved` already set; roll it back on failure.
    async fn submit_guarded(&mut self, minutes: u32, auto: bool) -> Result<Event> {
        let session = self.new_session(minutes, self.clock.now_ms());
        match self.recorder.submit(&session).await {
            Ok(()) => {
                info!(minutes, auto, name = %session.name, "session recorded");
                Ok(recorded_event(&session, auto))
            }
            Err(e) => {
                warn!(error = %e, "session record failed; it can be saved again");
                self.mark_auto_saved(false)?;
                Err(CoreError::submission(e))
            }
        }
    }

    fn new_session(&self, minutes: u32, now_ms: u64) -> NewSession {
        NewSession::from_tag(
            &self.options.user_id,
            &self.tag,
            &self.options.defaults,
            minutes,
            datetime_from_ms(now_ms),
        )
    }
}

fn recorded_event(session: &NewSession, auto: bool) -> Event {
    Event::SessionRecorded {
        name: session.name.clone(),
        category: session.category.clone(),
        duration_minutes: session.duration_minutes,
        auto,
        at: session.completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::FailingNotifier;
    use crate::notify::SilentNotifier;
    use crate::recorder::testing::MemoryRecorder;
    use crate::storage::MemorySnapshotStore;
    use crate::timer::{ManualClock, TimerSnapshot, MS_PER_MINUTE};

    const T0: u64 = 1_700_000_000_000;

    type Controller = TimerController<MemorySnapshotStore, MemoryRecorder, SilentNotifier, ManualClock>;

    struct Harness {
        store: MemorySnapshotStore,
        recorder: MemoryRecorder,
        clock: ManualClock,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemorySnapshotStore::new(),
                recorder: MemoryRecorder::default(),
                clock: ManualClock::new(T0),
            }
        }

        /// A new process reading the same snapshot.
        fn open(&self) -> Controller {
            TimerController::open(
                self.store.clone(),
                self.recorder.clone(),
                SilentNotifier,
                self.clock.clone(),
                ControllerOptions::default(),
            )
            .unwrap()
        }

        fn stored(&self) -> TimerSnapshot {
            self.store.load().unwrap().expect("snapshot persisted")
        }
    }

    #[tokio::test]
    async fn fresh_open_persists_idle_default() {
        let h = Harness::new();
        let timer = h.open();
        assert_eq!(timer.state(), TimerState::Idle);
        let stored = h.stored();
        assert_eq!(stored.initial_minutes, 25);
        assert_eq!(stored.remaining_ms, 25 * MS_PER_MINUTE);
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_idle() {
        let h = Harness::new();
        h.store.put_raw("{\"schema_version\":1,\"is_running\":tru");
        let timer = h.open();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(h.stored().initial_minutes, 25);
    }

    #[tokio::test]
    async fn finishes_while_away_and_records_once_on_reload() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(25).unwrap();
        timer.start().unwrap();
        drop(timer);

        // No ticks while backgrounded.
        h.clock.advance_minutes(25);

        let mut reloaded = h.open();
        let events = reloaded.reconcile().await.unwrap();
        assert_eq!(reloaded.state(), TimerState::Finished);
        assert!(reloaded.engine().is_auto_saved());
        assert!(matches!(events[0], Event::TimerCompleted { .. }));
        assert!(matches!(
            events[1],
            Event::SessionRecorded { duration_minutes: 25, auto: true, .. }
        ));

        let records = h.recorder.records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_minutes, 25);
        assert_eq!(records[0].category, "General");
        assert_eq!(records[0].name, "Study Session");
    }

    #[tokio::test]
    async fn reconcile_twice_never_duplicates() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.start().unwrap();
        h.clock.advance_minutes(30);

        timer.reconcile().await.unwrap();
        assert!(timer.reconcile().await.unwrap().is_empty());

        let mut reloaded = h.open();
        assert!(reloaded.reconcile().await.unwrap().is_empty());
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn natural_finish_on_tick_then_manual_save_rejected() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(10).unwrap();
        timer.start().unwrap();

        for _ in 0..(10 * 60 * 4) {
            h.clock.advance_ms(250);
            timer.tick().await.unwrap();
        }
        assert_eq!(timer.state(), TimerState::Finished);
        assert_eq!(h.recorder.count(), 1);
        assert_eq!(h.recorder.records.borrow()[0].duration_minutes, 10);

        let err = timer.save().await.unwrap_err();
        assert!(matches!(err, CoreError::Timer(TimerError::AlreadySaved)));
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn throttled_ticks_do_not_drift() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(10).unwrap();
        timer.start().unwrap();

        h.clock.advance_ms(3 * MS_PER_MINUTE + 17);
        timer.tick().await.unwrap();
        assert_eq!(timer.engine().remaining_ms(), 7 * MS_PER_MINUTE - 17);
        assert_eq!(h.stored().remaining_ms, 7 * MS_PER_MINUTE - 17);
    }

    #[tokio::test]
    async fn failed_auto_save_allows_one_manual_retry() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(5).unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(5);

        h.recorder.fail_next(1);
        let err = timer.reconcile().await.unwrap_err();
        assert!(matches!(err, CoreError::Submission(_)));
        assert_eq!(timer.state(), TimerState::Finished);
        assert!(!timer.engine().is_auto_saved());
        assert!(!h.stored().auto_saved);
        assert_eq!(h.recorder.count(), 0);

        let events = timer.save().await.unwrap();
        assert!(matches!(
            events[0],
            Event::SessionRecorded { duration_minutes: 5, auto: false, .. }
        ));
        assert_eq!(h.recorder.count(), 1);
        assert!(h.stored().auto_saved);

        assert!(matches!(
            timer.save().await,
            Err(CoreError::Timer(TimerError::AlreadySaved))
        ));
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn completion_pending_on_load_is_retried() {
        let h = Harness::new();
        let pending = TimerSnapshot {
            finished: true,
            remaining_ms: 0,
            ..TimerSnapshot::fresh(15, T0)
        };
        h.store.save(&pending).unwrap();

        let mut timer = h.open();
        let events = timer.reconcile().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(h.recorder.records.borrow()[0].duration_minutes, 15);
        assert!(h.stored().auto_saved);
    }

    #[tokio::test]
    async fn completion_recorded_elsewhere_is_adopted() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(5).unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(6);

        // A second instance finishes and records first.
        let mut other = h.open();
        other.reconcile().await.unwrap();
        assert_eq!(h.recorder.count(), 1);

        // The first still believes it is running. Its finish is adopted.
        timer.engine = TimerEngine::from_snapshot(TimerSnapshot {
            is_running: false,
            end_at: None,
            finished: true,
            remaining_ms: 0,
            ..timer.engine.snapshot().clone()
        });
        assert!(timer.complete().await.unwrap().is_empty());
        assert!(timer.engine().is_auto_saved());
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn notifier_failure_is_ignored() {
        let h = Harness::new();
        let notifier = FailingNotifier::default();
        let calls = notifier.calls.clone();
        let mut timer = TimerController::open(
            h.store.clone(),
            h.recorder.clone(),
            notifier,
            h.clock.clone(),
            ControllerOptions::default(),
        )
        .unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(25);

        timer.reconcile().await.unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(h.recorder.count(), 1);
        assert!(timer.engine().is_auto_saved());
    }

    /// Copies whatever is stored at the moment the cue fires.
    struct StoreSpy {
        store: MemorySnapshotStore,
        seen: std::cell::RefCell<Option<String>>,
    }

    impl Notifier for StoreSpy {
        fn notify(&self, _title: &str, _body: &str) -> Result<(), crate::notify::NotifyError> {
            let raw = self.store.load().unwrap().map(|s| s.encode().unwrap());
            *self.seen.borrow_mut() = raw;
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_is_claimed_after_notification() {
        let h = Harness::new();
        let spy = StoreSpy {
            store: h.store.clone(),
            seen: Default::default(),
        };
        let mut timer = TimerController::open(
            h.store.clone(),
            h.recorder.clone(),
            &spy,
            h.clock.clone(),
            ControllerOptions::default(),
        )
        .unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(25);
        timer.reconcile().await.unwrap();
        assert_eq!(h.recorder.count(), 1);

        let seen = spy.seen.borrow().clone().expect("notifier ran");
        let at_notify = TimerSnapshot::decode(&seen).unwrap();
        assert!(at_notify.finished);
        assert!(!at_notify.auto_saved);

        // The process dies during the cue: a reload from that image still
        // records the session.
        let crashed = Harness::new();
        crashed.store.put_raw(&seen);
        let mut reloaded = crashed.open();
        let events = reloaded.reconcile().await.unwrap();
        assert!(matches!(events[0], Event::SessionRecorded { auto: true, .. }));
        assert_eq!(crashed.recorder.count(), 1);
    }

    #[tokio::test]
    async fn manual_save_requires_a_minute() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.start().unwrap();
        h.clock.advance_ms(59_000);

        let err = timer.save().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Timer(TimerError::BelowMinimum { elapsed_ms: 59_000 })
        ));
        assert_eq!(h.recorder.count(), 0);
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[tokio::test]
    async fn manual_save_records_rounded_minutes_and_resets() {
        let h = Harness::new();
        let mut timer = h.open().with_tag(SessionTag {
            name: Some("Problem set".into()),
            category: Some("Math".into()),
            lecture_id: Some("lec-9".into()),
        });
        timer.start().unwrap();
        h.clock.advance_ms(5 * MS_PER_MINUTE + 30_000);
        timer.pause().unwrap();
        h.clock.advance_minutes(10);

        let events = timer.save().await.unwrap();
        assert!(matches!(events.last(), Some(Event::TimerReset { .. })));
        assert_eq!(timer.state(), TimerState::Idle);

        let records = h.recorder.records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_minutes, 6);
        assert_eq!(records[0].name, "Problem set");
        assert_eq!(records[0].lecture_id.as_deref(), Some("lec-9"));
        assert_eq!(records[0].completed_at.timestamp_millis() as u64, T0 + 15 * MS_PER_MINUTE + 30_000);
    }

    #[tokio::test]
    async fn failed_manual_save_keeps_session() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.start().unwrap();
        h.clock.advance_minutes(3);
        timer.pause().unwrap();

        h.recorder.fail_next(1);
        assert!(matches!(timer.save().await, Err(CoreError::Submission(_))));
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.engine().remaining_ms(), 22 * MS_PER_MINUTE);

        timer.save().await.unwrap();
        assert_eq!(h.recorder.count(), 1);
    }

    #[tokio::test]
    async fn save_when_idle_is_rejected() {
        let h = Harness::new();
        let mut timer = h.open();
        assert!(matches!(
            timer.save().await,
            Err(CoreError::Timer(TimerError::NothingToSave))
        ));
    }

    #[tokio::test]
    async fn reset_clears_flags_from_any_state() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(1).unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(1);
        timer.reconcile().await.unwrap();
        assert!(timer.engine().is_auto_saved());

        timer.reset().unwrap();
        let stored = h.stored();
        assert!(!stored.finished && !stored.auto_saved);
        assert_eq!(stored.remaining_ms, MS_PER_MINUTE);
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[tokio::test]
    async fn start_on_finished_timer_is_a_no_op() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(1).unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(2);
        timer.reconcile().await.unwrap();
        let before = h.stored();

        assert!(matches!(
            timer.start(),
            Err(CoreError::Timer(TimerError::NothingRemaining))
        ));
        assert_eq!(h.stored(), before);
    }

    #[tokio::test]
    async fn duration_locked_while_running() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.start().unwrap();
        assert!(matches!(
            timer.change_duration(50),
            Err(CoreError::Timer(TimerError::DurationLocked))
        ));
        assert_eq!(h.stored().initial_minutes, 25);
    }

    #[tokio::test]
    async fn pause_resume_survives_reloads() {
        let h = Harness::new();
        let mut timer = h.open();
        timer.change_duration(15).unwrap();
        timer.start().unwrap();
        h.clock.advance_minutes(5);
        h.open().pause().unwrap();

        h.clock.advance_minutes(4);
        h.open().start().unwrap();
        h.clock.advance_minutes(3);
        let mut last = h.open();
        last.reconcile().await.unwrap();
        last.pause().unwrap();

        assert_eq!(h.stored().remaining_ms, 420_000);
    }
}
