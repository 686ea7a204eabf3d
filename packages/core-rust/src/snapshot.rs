//! Point-in-time record snapshots.
//!
//! A [`Snapshot`] is the hand-off format between a record store and the
//! import/export mappers: an ordered, immutable list of records captured at
//! one instant. Restoring a snapshot into a store replays it record by record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Record;

/// Immutable ordered list of records.
///
/// Cloning is cheap: the records are shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Record>", into = "Vec<Record>")]
pub struct Snapshot {
    records: Arc<[Record]>,
}

impl Snapshot {
    /// Creates a snapshot that owns the given records, preserving their order.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// An empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The captured records in capture order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the captured records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Record>> for Snapshot {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl From<Snapshot> for Vec<Record> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.records.to_vec()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
