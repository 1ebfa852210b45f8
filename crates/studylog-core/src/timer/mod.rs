mod clock;
mod controller;
mod engine;
mod snapshot;
mod ticker;

pub use clock::{datetime_from_ms, Clock, ManualClock, SystemClock};
pub use controller::{ControllerOptions, TimerController};
pub use engine::{TimerEngine, TimerState, MAX_DURATION_MINUTES, MIN_SAVE_MS};
pub use snapshot::{TimerSnapshot, MS_PER_MINUTE, SNAPSHOT_SCHEMA_VERSION};
pub use ticker::{Tick, Ticker};
