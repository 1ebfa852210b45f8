//! Monthly calendar heatmap of study time.
//!
//! Sessions are bucketed by the local calendar day they were completed on,
//! then every day of the month gets an intensity level for display.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::SessionRecord;

/// Upper bounds (exclusive, minutes) of levels 1..=3. Level 4 is anything above.
const LEVEL_BOUNDS: [u64; 3] = [30, 60, 120];
const GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub minutes: u64,
    /// 0 (nothing) ..= 4 (two hours or more).
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthHeatmap {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayCell>,
    pub total_minutes: u64,
    pub active_days: u32,
    pub best_day: Option<NaiveDate>,
}

pub fn level_for(minutes: u64) -> u8 {
    if minutes == 0 {
        return 0;
    }
    LEVEL_BOUNDS
        .iter()
        .position(|&bound| minutes < bound)
        .map_or(4, |i| i as u8 + 1)
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, ValidationError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(ValidationError::InvalidMonth { year, month })
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Parse `YYYY-MM`.
pub fn parse_month(raw: &str) -> Result<(i32, u32), ValidationError> {
    let invalid = || ValidationError::invalid("month", format!("expected YYYY-MM, got '{raw}'"));
    let (y, m) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    first_of_month(year, month)?;
    Ok((year, month))
}

/// The UTC instants bounding a local calendar month, `[start, end)`.
pub fn month_bounds(
    year: i32,
    month: u32,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
    let invalid = ValidationError::InvalidMonth { year, month };
    let first = first_of_month(year, month)?;
    let next = next_month(first).ok_or_else(|| invalid.clone())?;
    let local_midnight = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
    };
    match (local_midnight(first), local_midnight(next)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(invalid),
    }
}

/// Minutes per local day within one month.
pub fn daily_minutes(
    records: &[SessionRecord],
    offset: FixedOffset,
    year: i32,
    month: u32,
) -> BTreeMap<NaiveDate, u64> {
    let mut days = BTreeMap::new();
    for record in records {
        let date = record.completed_at.with_timezone(&offset).date_naive();
        if date.year() == year && date.month() == month {
            *days.entry(date).or_insert(0) += u64::from(record.duration_minutes);
        }
    }
    days
}

impl MonthHeatmap {
    pub fn build(
        year: i32,
        month: u32,
        daily: &BTreeMap<NaiveDate, u64>,
    ) -> Result<Self, ValidationError> {
        let first = first_of_month(year, month)?;
        let days: Vec<DayCell> = first
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(|date| {
                let minutes = daily.get(&date).copied().unwrap_or(0);
                DayCell {
                    date,
                    minutes,
                    level: level_for(minutes),
                }
            })
            .collect();

        let total_minutes = days.iter().map(|d| d.minutes).sum();
        let active_days = days.iter().filter(|d| d.minutes > 0).count() as u32;
        // Earliest day wins a tie.
        let best_day = days
            .iter()
            .filter(|d| d.minutes > 0)
            .fold(None::<&DayCell>, |best, d| match best {
                Some(b) if b.minutes >= d.minutes => Some(b),
                _ => Some(d),
            })
            .map(|d| d.date);

        Ok(Self {
            year,
            month,
            days,
            total_minutes,
            active_days,
            best_day,
        })
    }

    /// Monday-first text calendar, one glyph per day, with a legend.
    pub fn render_grid(&self) -> String {
        let mut out = String::new();
        let title = self
            .days
            .first()
            .map(|d| d.date.format("%B %Y").to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "{title:^28}");
        let _ = writeln!(out, "Mo  Tu  We  Th  Fr  Sa  Su");

        let lead = self
            .days
            .first()
            .map_or(0, |d| d.date.weekday().num_days_from_monday() as usize);
        let mut line = "    ".repeat(lead);
        let mut column = lead;
        for cell in &self.days {
            let _ = write!(line, "{:>2}{} ", cell.date.day(), GLYPHS[cell.level as usize]);
            column += 1;
            if column == 7 {
                out.push_str(line.trim_end());
                out.push('\n');
                line.clear();
                column = 0;
            }
        }
        if !line.is_empty() {
            out.push_str(line.trim_end());
            out.push('\n');
        }

        let _ = writeln!(
            out,
            "\n{} none  {} <30m  {} <1h  {} <2h  {} 2h+",
            GLYPHS[0], GLYPHS[1], GLYPHS[2], GLYPHS[3], GLYPHS[4]
        );
        let _ = write!(
            out,
            "Total {} over {} day{}",
            format_minutes(self.total_minutes),
            self.active_days,
            if self.active_days == 1 { "" } else { "s" }
        );
        if let Some(best) = self.best_day {
            let _ = write!(out, ", best {}", best.format("%b %-d"));
        }
        out.push('\n');
        out
    }
}

/// `95` -> `1h 35m`.
pub fn format_minutes(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
