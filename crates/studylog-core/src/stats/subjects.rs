use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Subject, DEFAULT_SUBJECT_COLOR};
use crate::storage::SessionRecord;

/// Time spent on one category, with its legend color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTotal {
    pub category: String,
    pub color: String,
    pub minutes: u64,
    pub sessions: u64,
}

/// Totals per category, most minutes first (ties by name). Categories without
/// a catalog entry get the default color.
pub fn subject_totals(records: &[SessionRecord], subjects: &[Subject]) -> Vec<SubjectTotal> {
    let colors: HashMap<&str, &str> = subjects
        .iter()
        .map(|s| (s.name.as_str(), s.color.as_str()))
        .collect();

    let mut by_category: HashMap<&str, (u64, u64)> = HashMap::new();
    for record in records {
        let entry = by_category.entry(record.category.as_str()).or_default();
        entry.0 += u64::from(record.duration_minutes);
        entry.1 += 1;
    }

    let mut totals: Vec<SubjectTotal> = by_category
        .into_iter()
        .map(|(category, (minutes, sessions))| SubjectTotal {
            category: category.to_string(),
            color: colors
                .get(category)
                .copied()
                .unwrap_or(DEFAULT_SUBJECT_COLOR)
                .to_string(),
            minutes,
            sessions,
        })
        .collect();
    totals.sort_by(|a, b| b.minutes.cmp(&a.minutes).then_with(|| a.category.cmp(&b.category)));
    totals
}
