//! Where the timer snapshot lives between processes.

use std::cell::RefCell;
use std::rc::Rc;

use super::Database;
use crate::error::Result;
use crate::recorder::SessionTag;
use crate::timer::TimerSnapshot;

pub fn snapshot_key(user_id: &str) -> String {
    format!("timer_snapshot:{user_id}")
}

pub fn tag_key(user_id: &str) -> String {
    format!("timer_tag:{user_id}")
}

/// Load/save capability for one user's timer snapshot.
///
/// `load` returns `Ok(None)` for a missing, unreadable or outdated record;
/// only storage failures are errors.
pub trait SnapshotStore {
    fn load(&self) -> Result<Option<TimerSnapshot>>;
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn load(&self) -> Result<Option<TimerSnapshot>> {
        (**self).load()
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

fn decode_logged(raw: &str) -> Option<TimerSnapshot> {
    let snapshot = TimerSnapshot::decode(raw);
    if snapshot.is_none() {
        tracing::warn!("discarding unreadable or outdated timer snapshot");
    }
    snapshot
}

/// Snapshot kept in the database key-value table, keyed per user.
pub struct KvSnapshotStore<'a> {
    db: &'a Database,
    user_id: String,
}

impl<'a> KvSnapshotStore<'a> {
    pub fn new(db: &'a Database, user_id: &str) -> Self {
        Self {
            db,
            user_id: user_id.to_string(),
        }
    }

    /// Labels for the next record. Unreadable tags are treated as empty.
    pub fn load_tag(&self) -> Result<SessionTag> {
        Ok(self
            .db
            .kv_get(&tag_key(&self.user_id))?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    pub fn save_tag(&self, tag: &SessionTag) -> Result<()> {
        self.db
            .kv_set(&tag_key(&self.user_id), &serde_json::to_string(tag)?)
    }
}

impl SnapshotStore for KvSnapshotStore<'_> {
    fn load(&self) -> Result<Option<TimerSnapshot>> {
        Ok(self
            .db
            .kv_get(&snapshot_key(&self.user_id))?
            .and_then(|raw| decode_logged(&raw)))
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        self.db
            .kv_set(&snapshot_key(&self.user_id), &snapshot.encode()?)
    }

    fn clear(&self) -> Result<()> {
        self.db.kv_delete(&snapshot_key(&self.user_id))
    }
}

/// In-process store. Clones share the same slot, so a second controller over
/// a clone behaves like a reloaded process reading the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_raw(&self, raw: &str) {
        *self.slot.borrow_mut() = Some(raw.to_string());
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<TimerSnapshot>> {
        Ok(self.slot.borrow().as_deref().and_then(decode_logged))
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        *self.slot.borrow_mut() = Some(snapshot.encode()?);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}
