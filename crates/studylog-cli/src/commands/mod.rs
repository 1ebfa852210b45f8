pub mod calendar;
pub mod config;
mod context;
pub mod history;
pub mod lecture;
pub mod stats;
pub mod subject;
pub mod timer;

pub use context::Context;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
