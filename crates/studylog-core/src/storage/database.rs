//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Recorded study sessions
//! - The subject catalog and lecture goals
//! - Key-value store for application state (timer snapshot, session tag)

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::catalog::{
    normalize_color, normalize_label, CatalogProvider, Lecture, LectureRef, Subject,
};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::recorder::{NewSession, SessionRecorder};

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub completed_at: DateTime<Utc>,
    pub category: String,
    pub lecture_id: Option<String>,
}

/// Minutes logged against a lecture goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureProgress {
    pub lecture: Lecture,
    pub logged_minutes: u64,
    pub sessions: u64,
    /// 0..=100, capped for display.
    pub percent: f64,
    pub completed: bool,
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/studylog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("studylog.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Record a session to the database.
    ///
    /// # Errors
    /// Returns an error if the duration is zero or the insert fails.
    pub fn insert_session(&self, session: &NewSession) -> Result<i64> {
        if session.duration_minutes == 0 {
            return Err(ValidationError::invalid("duration_minutes", "must be positive").into());
        }
        self.conn.execute(
            "INSERT INTO sessions (user_id, name, duration_minutes, completed_at, category, lecture_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.user_id,
                session.name,
                session.duration_minutes,
                format_ts(&session.completed_at),
                session.category,
                session.lecture_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, duration_minutes, completed_at, category, lecture_id
             FROM sessions
             WHERE user_id = ?1
             ORDER BY completed_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], session_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Sessions completed in `[from, to)`, oldest first.
    pub fn sessions_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, duration_minutes, completed_at, category, lecture_id
             FROM sessions
             WHERE user_id = ?1 AND completed_at >= ?2 AND completed_at < ?3
             ORDER BY completed_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, format_ts(&from), format_ts(&to)],
            session_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Returns false if no such session exists for this user.
    pub fn delete_session(&self, user_id: &str, id: i64) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(n > 0)
    }

    // ── Subjects ─────────────────────────────────────────────────────

    /// Add a subject, or recolor it if it already exists.
    pub fn add_subject(&self, user_id: &str, name: &str, color: &str) -> Result<Subject> {
        let subject = Subject {
            name: normalize_label("name", name)?,
            color: normalize_color(color)?,
        };
        self.conn.execute(
            "INSERT INTO subjects (user_id, name, color) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, name) DO UPDATE SET color = excluded.color",
            params![user_id, subject.name, subject.color],
        )?;
        Ok(subject)
    }

    pub fn remove_subject(&self, user_id: &str, name: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM subjects WHERE user_id = ?1 AND name = ?2",
            params![user_id, name.trim()],
        )?;
        Ok(n > 0)
    }

    pub fn subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, color FROM subjects WHERE user_id = ?1 ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Subject {
                name: row.get(0)?,
                color: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Lectures ─────────────────────────────────────────────────────

    pub fn add_lecture(
        &self,
        user_id: &str,
        title: &str,
        category: &str,
        target_minutes: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Lecture> {
        if target_minutes == 0 {
            return Err(ValidationError::invalid("target_minutes", "must be at least 1").into());
        }
        let lecture = Lecture {
            id: uuid::Uuid::new_v4().to_string(),
            title: normalize_label("title", title)?,
            category: normalize_label("subject", category)?,
            target_minutes,
            created_at,
        };
        self.conn.execute(
            "INSERT INTO lectures (id, user_id, title, category, target_minutes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lecture.id,
                user_id,
                lecture.title,
                lecture.category,
                lecture.target_minutes,
                format_ts(&lecture.created_at),
            ],
        )?;
        Ok(lecture)
    }

    pub fn remove_lecture(&self, user_id: &str, id: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM lectures WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(n > 0)
    }

    /// All lectures, or only those of one subject.
    pub fn lectures(&self, user_id: &str, subject: Option<&str>) -> Result<Vec<Lecture>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, category, target_minutes, created_at
             FROM lectures
             WHERE user_id = ?1 AND (?2 IS NULL OR category = ?2)
             ORDER BY category COLLATE NOCASE, title COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![user_id, subject.map(str::trim)], |row| {
            lecture_from_row(row, 0)
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn lecture_progress(&self, user_id: &str) -> Result<Vec<LectureProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.title, l.category, l.target_minutes, l.created_at,
                    COALESCE(SUM(s.duration_minutes), 0), COUNT(s.id)
             FROM lectures l
             LEFT JOIN sessions s ON s.lecture_id = l.id AND s.user_id = l.user_id
             WHERE l.user_id = ?1
             GROUP BY l.id
             ORDER BY l.category COLLATE NOCASE, l.title COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let lecture = lecture_from_row(row, 0)?;
            let logged_minutes: u64 = row.get(5)?;
            let sessions: u64 = row.get(6)?;
            let target = u64::from(lecture.target_minutes);
            Ok(LectureProgress {
                percent: (logged_minutes as f64 / target as f64 * 100.0).min(100.0),
                completed: logged_minutes >= target,
                lecture,
                logged_minutes,
                sessions,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SessionRecorder for Database {
    async fn submit(&self, session: &NewSession) -> Result<()> {
        let id = self.insert_session(session)?;
        tracing::debug!(id, user_id = %session.user_id, "session stored locally");
        Ok(())
    }
}

impl CatalogProvider for Database {
    async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        self.subjects(user_id)
    }

    async fn list_lectures_for_subject(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<LectureRef>> {
        Ok(self
            .lectures(user_id, Some(subject))?
            .iter()
            .map(Lecture::to_ref)
            .collect())
    }
}

/// Fixed-width RFC 3339 so text comparison matches time order.
fn format_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let completed_at: String = row.get(4)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        completed_at: parse_ts(4, &completed_at)?,
        category: row.get(5)?,
        lecture_id: row.get(6)?,
    })
}

fn lecture_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Lecture> {
    let created_at: String = row.get(offset + 4)?;
    Ok(Lecture {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        category: row.get(offset + 2)?,
        target_minutes: row.get(offset + 3)?,
        created_at: parse_ts(offset + 4, &created_at)?,
    })
}
