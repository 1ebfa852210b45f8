use std::error::Error;

use chrono::{Datelike, FixedOffset, Local, Offset};
use studylog_core::stats::{daily_minutes, month_bounds, parse_month, MonthHeatmap};
use studylog_core::SessionRecord;

use super::context::Context;
use super::print_json;

/// Year, month and the local UTC offset days are bucketed under.
pub(crate) fn resolve_month(month: Option<&str>) -> Result<(i32, u32, FixedOffset), Box<dyn Error>> {
    let now = Local::now();
    let (year, month) = match month {
        Some(raw) => parse_month(raw)?,
        None => (now.year(), now.month()),
    };
    Ok((year, month, now.offset().fix()))
}

/// Sessions completed within the local calendar month.
pub(crate) fn month_sessions(
    ctx: &Context,
    year: i32,
    month: u32,
    offset: FixedOffset,
) -> Result<Vec<SessionRecord>, Box<dyn Error>> {
    ctx.warn_if_remote();
    let (from, to) = month_bounds(year, month, offset)?;
    Ok(ctx.db.sessions_between(&ctx.user_id, from, to)?)
}

pub fn run(month: Option<&str>, json: bool, ctx: &Context) -> Result<(), Box<dyn Error>> {
    let (year, month, offset) = resolve_month(month)?;
    let records = month_sessions(ctx, year, month, offset)?;
    let heatmap = MonthHeatmap::build(year, month, &daily_minutes(&records, offset, year, month))?;
    if json {
        print_json(&heatmap)?;
    } else {
        print!("{}", heatmap.render_grid());
    }
    Ok(())
}
