mod config;
pub mod database;
pub mod migrations;
mod snapshot_store;

pub use config::{
    Config, NotificationsConfig, ProfileConfig, RemoteConfig, SessionConfig, TimerConfig,
};
pub use database::{Database, LectureProgress, SessionRecord};
pub use snapshot_store::{
    snapshot_key, tag_key, KvSnapshotStore, MemorySnapshotStore, SnapshotStore,
};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `STUDYLOG_HOME` wins if set. Otherwise `~/.config/studylog`, or
/// `~/.config/studylog-dev` when `STUDYLOG_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("STUDYLOG_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYLOG_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studylog-dev")
            } else {
                base_dir.join("studylog")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
