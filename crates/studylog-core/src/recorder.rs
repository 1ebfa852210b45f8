//! Session records and the recorder contract.
//!
//! A recorder takes one finished (or manually saved) session and writes it
//! somewhere durable. The write is all-or-nothing; there is no partial
//! success and no retry here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_SESSION_NAME: &str = "Study Session";
pub const DEFAULT_CATEGORY: &str = "General";

/// A session about to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub completed_at: DateTime<Utc>,
    pub category: String,
    pub lecture_id: Option<String>,
}

/// Labels the next record will carry. Everything is optional; blanks fall
/// back to [`RecordDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTag {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub lecture_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefaults {
    pub name: String,
    pub category: String,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_NAME.into(),
            category: DEFAULT_CATEGORY.into(),
        }
    }
}

impl NewSession {
    pub fn from_tag(
        user_id: &str,
        tag: &SessionTag,
        defaults: &RecordDefaults,
        duration_minutes: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: non_blank(tag.name.as_deref()).unwrap_or(&defaults.name).to_string(),
            duration_minutes,
            completed_at,
            category: non_blank(tag.category.as_deref())
                .unwrap_or(&defaults.category)
                .to_string(),
            lecture_id: non_blank(tag.lecture_id.as_deref()).map(str::to_string),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Writes one session record.
#[allow(async_fn_in_trait)]
pub trait SessionRecorder {
    async fn submit(&self, session: &NewSession) -> Result<()>;
}

impl<T: SessionRecorder + ?Sized> SessionRecorder for &T {
    async fn submit(&self, session: &NewSession) -> Result<()> {
        (**self).submit(session).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::error::{CoreError, RemoteError};

    /// Keeps every submitted record; can be told to fail the next submits.
    #[derive(Clone, Default)]
    pub struct MemoryRecorder {
        pub records: Rc<RefCell<Vec<NewSession>>>,
        failures_left: Rc<Cell<u32>>,
    }

    impl MemoryRecorder {
        pub fn fail_next(&self, times: u32) {
            self.failures_left.set(times);
        }

        pub fn count(&self) -> usize {
            self.records.borrow().len()
        }
    }

    impl SessionRecorder for MemoryRecorder {
        async fn submit(&self, session: &NewSession) -> Result<()> {
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                return Err(CoreError::Remote(RemoteError::Status {
                    status: 503,
                    body: "service unavailable".into(),
                }));
            }
            self.records.borrow_mut().push(session.clone());
            Ok(())
        }
    }
}
