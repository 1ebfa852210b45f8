//! Subjects and lectures available for tagging sessions.
//!
//! Catalog data is advisory: a session carries a category name and an
//! optional lecture id, and nothing checks that either still exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

pub const DEFAULT_SUBJECT_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub color: String,
}

/// The part of a lecture a catalog hands out for tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureRef {
    pub id: String,
    pub title: String,
}

/// A goal-tracking target sessions can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: String,
    pub title: String,
    pub category: String,
    pub target_minutes: u32,
    pub created_at: DateTime<Utc>,
}

impl Lecture {
    pub fn to_ref(&self) -> LectureRef {
        LectureRef {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait CatalogProvider {
    async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>>;

    async fn list_lectures_for_subject(&self, user_id: &str, subject: &str)
        -> Result<Vec<LectureRef>>;
}

impl<T: CatalogProvider + ?Sized> CatalogProvider for &T {
    async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        (**self).list_subjects(user_id).await
    }

    async fn list_lectures_for_subject(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<LectureRef>> {
        (**self).list_lectures_for_subject(user_id, subject).await
    }
}

/// Trimmed, non-empty subject or lecture label.
pub fn normalize_label(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }
    if trimmed.chars().count() > 100 {
        return Err(ValidationError::invalid(field, "must be at most 100 characters"));
    }
    Ok(trimmed.to_string())
}

/// `#rrggbb`, lowercased.
pub fn normalize_color(value: &str) -> Result<String, ValidationError> {
    let hex = value
        .strip_prefix('#')
        .filter(|h| h.len() == 6 && h.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| ValidationError::invalid("color", format!("expected #rrggbb, got '{value}'")))?;
    Ok(format!("#{}", hex.to_ascii_lowercase()))
}
