//! Periodic display refresh.
//!
//! A [`Ticker`] owns at most one repeating task. Starting it again replaces
//! the task; stopping it aborts the task and throws away any tick already
//! queued, so nothing from an older run is delivered after a pause or reset.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One refresh signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Which `start()` produced this tick.
    pub generation: u64,
    pub seq: u64,
}

pub struct Ticker {
    period: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
    tx: mpsc::Sender<Tick>,
    rx: mpsc::Receiver<Tick>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        // Capacity 1: a slow consumer sees one pending tick, not a backlog.
        let (tx, rx) = mpsc::channel(1);
        Self {
            period,
            generation: 0,
            task: None,
            tx,
            rx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// (Re)start ticking. Any previous task is aborted first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        self.stop();
        self.generation += 1;
        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq = 0;
            loop {
                interval.tick().await;
                seq += 1;
                // Full channel: the consumer already has a tick to handle.
                if let Err(mpsc::error::TrySendError::Closed(_)) =
                    tx.try_send(Tick { generation, seq })
                {
                    break;
                }
            }
        }));
        tracing::debug!(generation, period_ms = self.period.as_millis() as u64, "ticker started");
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(generation = self.generation, "ticker stopped");
        }
        while self.rx.try_recv().is_ok() {}
    }

    /// Wait for the next tick of the current run. Never resolves while
    /// stopped, so it can sit in a `select!` next to other event sources.
    pub async fn next(&mut self) -> Tick {
        loop {
            if self.task.is_none() {
                std::future::pending::<()>().await;
            }
            // The sender half lives in `self`, so the channel never closes.
            if let Some(tick) = self.rx.recv().await {
                if tick.generation == self.generation {
                    return tick;
                }
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
