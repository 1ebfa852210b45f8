//! # studylog Core Library
//!
//! This library provides the core logic for the studylog study timer. All
//! operations are exposed through the `studylog` CLI, which is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine over a persisted
//!   snapshot. The end timestamp is authoritative, so suspension of the
//!   process (exit, sleep, throttled ticks) never loses time
//! - **Timer Controller**: Wires the engine to a snapshot store, a session
//!   recorder, a best-effort notifier and a clock; records each finished
//!   session exactly once
//! - **Storage**: SQLite session/catalog storage and TOML configuration
//! - **Remote**: Optional PostgREST-style hosted store for sessions and catalogs
//! - **Stats**: Monthly calendar heatmap, per-subject totals
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerController`]: Persistence, reconciliation and completion handling
//! - [`Database`]: Session and catalog persistence
//! - [`Config`]: Application configuration management
//! - [`SessionRecorder`] / [`CatalogProvider`]: Store contracts

pub mod catalog;
pub mod error;
pub mod events;
pub mod notify;
pub mod recorder;
pub mod remote;
pub mod stats;
pub mod storage;
pub mod timer;

pub use catalog::{CatalogProvider, Lecture, LectureRef, Subject};
pub use error::{ConfigError, CoreError, DatabaseError, RemoteError, TimerError, ValidationError};
pub use events::Event;
pub use notify::{BellNotifier, ChainNotifier, CommandNotifier, Notifier, SilentNotifier};
pub use recorder::{NewSession, RecordDefaults, SessionRecorder, SessionTag};
pub use remote::RemoteStore;
pub use stats::{MonthHeatmap, SubjectTotal};
pub use storage::{Config, Database, KvSnapshotStore, SessionRecord, SnapshotStore};
pub use timer::{
    Clock, ControllerOptions, SystemClock, Ticker, TimerController, TimerEngine, TimerSnapshot,
    TimerState,
};
