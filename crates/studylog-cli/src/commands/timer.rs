use std::error::Error;
use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::Subcommand;
use studylog_core::catalog::{normalize_label, CatalogProvider};
use studylog_core::stats::format_minutes;
use studylog_core::{
    ChainNotifier, CoreError, Event, KvSnapshotStore, SessionTag, SystemClock, Ticker,
    TimerController, TimerState,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::context::{Backend, Context};
use super::print_json;

type Timer<'a> = TimerController<&'a KvSnapshotStore<'a>, Backend<'a>, ChainNotifier, SystemClock>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the current timer state as JSON
    Status,
    /// Start the countdown, or resume it when paused
    Start {
        /// Session name recorded on completion
        #[arg(long)]
        name: Option<String>,
        /// Subject (category) the session counts towards
        #[arg(long)]
        subject: Option<String>,
        /// Lecture id the session counts towards
        #[arg(long)]
        lecture: Option<String>,
    },
    /// Pause the countdown
    Pause,
    /// Stop and restore the full duration
    Reset,
    /// Change the session length (while stopped)
    Duration {
        /// New length in minutes
        minutes: u32,
    },
    /// Record the elapsed time now
    Save,
    /// Live countdown; reads s/p/r/v/q commands from stdin
    Watch {
        /// Exit once the countdown finishes
        #[arg(long)]
        exit_on_finish: bool,
    },
}

pub async fn run(action: TimerAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    let store = KvSnapshotStore::new(&ctx.db, &ctx.user_id);
    let tag = store.load_tag()?;
    let mut timer = TimerController::open(
        &store,
        ctx.backend(),
        ctx.notifier(),
        SystemClock,
        ctx.controller_options(),
    )?
    .with_tag(tag);

    // A manual save must not race an automatic record of the same session.
    let mut events = match action {
        TimerAction::Save => Vec::new(),
        _ => catch_up(&mut timer).await?,
    };

    match action {
        TimerAction::Status => {
            events.push(timer.status());
        }
        TimerAction::Start {
            name,
            subject,
            lecture,
        } => {
            let tag = merge_tag(timer.tag(), name, subject, lecture)?;
            check_catalog(ctx, &tag).await;
            store.save_tag(&tag)?;
            timer.set_tag(tag);
            events.push(timer.start()?);
        }
        TimerAction::Pause => {
            events.push(timer.pause()?);
            // Pausing past the end finishes the countdown.
            events.extend(catch_up(&mut timer).await?);
        }
        TimerAction::Reset => events.push(timer.reset()?),
        TimerAction::Duration { minutes } => events.push(timer.change_duration(minutes)?),
        TimerAction::Save => events.extend(timer.save().await?),
        TimerAction::Watch { exit_on_finish } => {
            emit_lines(&events)?;
            let period = Duration::from_millis(ctx.config.timer.tick_interval_ms);
            return watch(&mut timer, period, exit_on_finish).await;
        }
    }

    for event in &events {
        print_json(event)?;
    }
    Ok(())
}

/// Reconcile with the wall clock. A completion record that could not be
/// written is reported and left for `timer save`; it does not block other
/// commands.
async fn catch_up(timer: &mut Timer<'_>) -> Result<Vec<Event>, Box<dyn Error>> {
    match timer.reconcile().await {
        Ok(events) => Ok(events),
        Err(CoreError::Submission(e)) => {
            eprintln!("warning: finished session was not recorded ({e}); run `studylog timer save` to retry");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn merge_tag(
    current: &SessionTag,
    name: Option<String>,
    subject: Option<String>,
    lecture: Option<String>,
) -> Result<SessionTag, Box<dyn Error>> {
    let mut tag = current.clone();
    // An empty value clears the field back to the configured default.
    if let Some(name) = name {
        tag.name = label_or_clear("name", &name)?;
    }
    if let Some(subject) = subject {
        tag.category = label_or_clear("subject", &subject)?;
    }
    if let Some(lecture) = lecture {
        tag.lecture_id = Some(lecture.trim().to_string()).filter(|l| !l.is_empty());
    }
    Ok(tag)
}

fn label_or_clear(field: &str, value: &str) -> Result<Option<String>, Box<dyn Error>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(normalize_label(field, value)?))
}

/// Catalog entries are advisory; unknown names only earn a warning.
async fn check_catalog(ctx: &Context, tag: &SessionTag) {
    let backend = ctx.backend();
    if let Some(subject) = tag.category.as_deref() {
        match backend.list_subjects(&ctx.user_id).await {
            Ok(subjects) if !subjects.iter().any(|s| s.name == subject) => {
                tracing::warn!(subject, "subject is not in the catalog");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "could not load subjects"),
        }
        if let Some(lecture) = tag.lecture_id.as_deref() {
            match backend.list_lectures_for_subject(&ctx.user_id, subject).await {
                Ok(lectures) if !lectures.iter().any(|l| l.id == lecture) => {
                    tracing::warn!(lecture, subject, "lecture is not listed under this subject");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "could not load lectures"),
            }
        }
    }
}

fn emit_lines(events: &[Event]) -> Result<(), Box<dyn Error>> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

async fn watch(
    timer: &mut Timer<'_>,
    period: Duration,
    exit_on_finish: bool,
) -> Result<(), Box<dyn Error>> {
    let mut ticker = Ticker::new(period);
    if timer.state() == TimerState::Running {
        ticker.start();
    }
    let mut display = Display::new();
    display.render(timer);
    if exit_on_finish && timer.state() == TimerState::Finished {
        display.clear();
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.next() => {
                let events = catch_up(timer).await?;
                if timer.state() != TimerState::Running {
                    ticker.stop();
                }
                display.clear();
                emit_lines(&events)?;
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                let key = line.trim();
                if key == "q" {
                    break;
                }
                let outcome = apply_key(timer, &mut ticker, key).await;
                display.clear();
                match outcome {
                    Ok(events) => emit_lines(&events)?,
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            _ = &mut ctrl_c => break,
        }

        display.render(timer);
        if exit_on_finish && timer.state() == TimerState::Finished {
            break;
        }
    }

    ticker.stop();
    display.clear();
    Ok(())
}

async fn apply_key(
    timer: &mut Timer<'_>,
    ticker: &mut Ticker,
    key: &str,
) -> Result<Vec<Event>, Box<dyn Error>> {
    let events = match key {
        "s" => {
            let event = timer.start()?;
            ticker.start();
            vec![event]
        }
        "p" => {
            let event = timer.pause()?;
            ticker.stop();
            let mut events = vec![event];
            events.extend(catch_up(timer).await?);
            events
        }
        "r" => {
            let event = timer.reset()?;
            ticker.stop();
            vec![event]
        }
        "v" => {
            let events = timer.save().await?;
            if timer.state() != TimerState::Running {
                ticker.stop();
            }
            events
        }
        "" => Vec::new(),
        other => return Err(format!("unknown command '{other}' (s start, p pause, r reset, v save, q quit)").into()),
    };
    Ok(events)
}

/// Single status line on stderr, redrawn in place. Silent when stderr is
/// not a terminal.
struct Display {
    enabled: bool,
    last: Option<(TimerState, u64)>,
}

impl Display {
    fn new() -> Self {
        Self {
            enabled: std::io::stderr().is_terminal(),
            last: None,
        }
    }

    fn render(&mut self, timer: &Timer<'_>) {
        if !self.enabled {
            return;
        }
        let engine = timer.engine();
        let state = engine.state();
        let seconds = engine.remaining_at(timer.now_ms()).div_ceil(1000);
        if self.last == Some((state, seconds)) {
            return;
        }
        self.last = Some((state, seconds));

        let label = match state {
            TimerState::Idle => "ready",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Finished => "finished",
        };
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\r\x1b[2K{:02}:{:02}  {label}  ({} session)",
            seconds / 60,
            seconds % 60,
            format_minutes(u64::from(engine.initial_minutes()))
        );
        let _ = err.flush();
    }

    fn clear(&mut self) {
        if !self.enabled {
            return;
        }
        self.last = None;
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K");
        let _ = err.flush();
    }
}
