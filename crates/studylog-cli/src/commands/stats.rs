use std::error::Error;

use serde::Serialize;
use studylog_core::stats::{subject_totals, SubjectTotal};
use studylog_core::CatalogProvider;

use super::calendar::{month_sessions, resolve_month};
use super::context::Context;
use super::print_json;

#[derive(Serialize)]
struct MonthStats {
    month: String,
    total_minutes: u64,
    sessions: u64,
    subjects: Vec<SubjectTotal>,
}

pub async fn run(month: Option<&str>, ctx: &Context) -> Result<(), Box<dyn Error>> {
    let (year, month, offset) = resolve_month(month)?;
    let records = month_sessions(ctx, year, month, offset)?;
    // Colors only; a catalog outage should not hide the numbers.
    let subjects = match ctx.backend().list_subjects(&ctx.user_id).await {
        Ok(subjects) => subjects,
        Err(e) => {
            tracing::warn!(error = %e, "could not load subject colors");
            Vec::new()
        }
    };

    let totals = subject_totals(&records, &subjects);
    print_json(&MonthStats {
        month: format!("{year}-{month:02}"),
        total_minutes: totals.iter().map(|t| t.minutes).sum(),
        sessions: totals.iter().map(|t| t.sessions).sum(),
        subjects: totals,
    })?;
    Ok(())
}
