//! Point-in-time roster captures.
//!
//! Two independent modes share one [`KvStore`]:
//!
//! - **Alternating buffer**: slots A and B plus a stored pointer naming the
//!   active (newest) slot. [`SnapshotStore::save`] writes the inactive slot
//!   and flips the pointer, so exactly one previous generation is retained.
//! - **Labeled captures**: [`SnapshotStore::save_at`] / [`SnapshotStore::load_at`]
//!   address a snapshot by a fixed label (e.g. `evening`), independent of
//!   the pointer.
//!
//! Key layout:
//! ```text
//! snapshot/active        "a" | "b"
//! snapshot/slot/a        Snapshot JSON
//! snapshot/slot/b        Snapshot JSON
//! snapshot/label/<name>  Snapshot JSON
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{get_json, set_json, KvStore};
use crate::types::Snapshot;

const ACTIVE_KEY: &str = "snapshot/active";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Slot::A => "snapshot/slot/a",
            Slot::B => "snapshot/slot/b",
        }
    }
}

/// The older and newer halves of the alternating buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPair {
    pub prev: Option<Snapshot>,
    pub curr: Option<Snapshot>,
}

fn label_key(label: &str) -> String {
    format!("snapshot/label/{label}")
}

/// Snapshot view over a borrowed key-value store.
pub struct SnapshotStore<'a> {
    kv: &'a mut dyn KvStore,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(kv: &'a mut dyn KvStore) -> Self {
        Self { kv }
    }

    /// The slot holding the newest capture. A fresh store starts on A, so
    /// the first save lands in B.
    pub fn active_slot(&self) -> Result<Slot> {
        Ok(get_json(&*self.kv, ACTIVE_KEY)?.unwrap_or(Slot::A))
    }

    /// Write `snapshot` to the inactive slot, then make it active.
    pub fn save(&mut self, snapshot: &Snapshot) -> Result<Slot> {
        let target = self.active_slot()?.other();
        set_json(self.kv, target.key(), snapshot)?;
        set_json(self.kv, ACTIVE_KEY, &target)?;
        tracing::debug!(slot = ?target, entries = snapshot.entries.len(), "saved snapshot");
        Ok(target)
    }

    /// Read `(older, newer)` without moving the pointer.
    pub fn load_prev_and_curr(&self) -> Result<SnapshotPair> {
        let active = self.active_slot()?;
        Ok(SnapshotPair {
            prev: get_json(&*self.kv, active.other().key())?,
            curr: get_json(&*self.kv, active.key())?,
        })
    }

    pub fn save_at(&mut self, label: &str, snapshot: &Snapshot) -> Result<()> {
        set_json(self.kv, &label_key(label), snapshot)?;
        tracing::debug!(label, entries = snapshot.entries.len(), "saved labeled snapshot");
        Ok(())
    }

    pub fn load_at(&self, label: &str) -> Result<Option<Snapshot>> {
        get_json(&*self.kv, &label_key(label))
    }
}
