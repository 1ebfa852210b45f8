//! Statistics over recorded sessions.
//!
//! This module provides the monthly calendar heatmap and per-subject totals
//! shown next to it.

mod heatmap;
mod subjects;

pub use heatmap::{
    daily_minutes, format_minutes, level_for, month_bounds, parse_month, DayCell, MonthHeatmap,
};
pub use subjects::{subject_totals, SubjectTotal};
