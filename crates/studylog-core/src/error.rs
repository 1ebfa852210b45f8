//! Core error types for studylog-core.
//!
//! Errors fall into a few groups: local validation rejections from the timer
//! state machine, storage failures, configuration problems and remote store
//! failures. Everything converges on [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studylog-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Timer operation rejected in the current state
    #[error("{0}")]
    Timer(#[from] TimerError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remote store errors
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// A session record could not be written. The timer keeps its own state.
    #[error("Failed to record session: {0}")]
    Submission(#[source] Box<CoreError>),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations the timer state machine refuses.
///
/// These are user-facing and never leave the timer in a changed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("nothing left to count down; reset or change the duration first")]
    NothingRemaining,

    #[error("timer is already running")]
    AlreadyRunning,

    #[error("timer is not running")]
    NotRunning,

    #[error("duration can only be changed while the timer is stopped")]
    DurationLocked,

    #[error("the finished session has not been recorded yet; save or reset it first")]
    UnrecordedSession,

    #[error("duration must be between 1 and {max} minutes, got {minutes}")]
    InvalidDuration { minutes: u32, max: u32 },

    #[error("at least one minute must elapse before saving (elapsed {elapsed_ms} ms)")]
    BelowMinimum { elapsed_ms: u64 },

    #[error("this session has already been saved")]
    AlreadySaved,

    #[error("there is no session in progress to save")]
    NothingToSave,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-separated key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors for catalog and statistics input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Month outside 1..=12 or unrepresentable year
    #[error("Invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Remote (REST) store errors.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote store is not configured (set remote.url and remote.api_key)")]
    NotConfigured,

    #[error("invalid remote URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store responded with {status}: {body}")]
    Status { status: u16, body: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl CoreError {
    /// Wrap a recorder failure so callers can tell it apart from a rejection.
    pub fn submission(err: impl Into<CoreError>) -> Self {
        CoreError::Submission(Box::new(err.into()))
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Remote(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
