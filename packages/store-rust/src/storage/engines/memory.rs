//! In-memory [`RecordService`] implementation.
//!
//! Records live in a [`BTreeMap`] keyed by an insertion sequence number, so
//! iteration follows insertion order and every record keeps a stable location
//! for the secondary index. Deletes remove records outright: there are no
//! tombstones and nothing to compact.

use std::collections::BTreeMap;
use std::sync::Arc;

use cabinet_core::{Conditions, Record, RecordFields, RecordId, RecordValidator, Snapshot};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::storage::error::StoreError;
use crate::storage::index::SecondaryIndex;
use crate::storage::record_store::{restore_rejection, LocationReader, Lookup, RecordService};

/// Non-persistent record store.
pub struct MemoryRecordStore {
    records: BTreeMap<u64, Record>,
    next_seq: u64,
    /// Largest id ever stored. Never lowered.
    max_id: RecordId,
    index: SecondaryIndex<u64>,
    validator: Arc<dyn RecordValidator>,
}

impl MemoryRecordStore {
    /// Creates an empty store that validates every mutation with `validator`.
    #[must_use]
    pub fn new(validator: Arc<dyn RecordValidator>) -> Self {
        Self {
            records: BTreeMap::new(),
            next_seq: 0,
            max_id: 0,
            index: SecondaryIndex::new(),
            validator,
        }
    }

    fn locate(&self, id: RecordId) -> Option<u64> {
        self.records
            .iter()
            .find_map(|(seq, record)| (record.id == id).then_some(*seq))
    }

    fn append(&mut self, record: Record) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.max_id = self.max_id.max(record.id);
        self.index.add(seq, &record);
        debug!(id = record.id, seq, "record stored");
        self.records.insert(seq, record);
    }

    fn remove_at(&mut self, seq: u64) -> Option<Record> {
        let record = self.records.remove(&seq)?;
        self.index.remove(seq, &record);
        Some(record)
    }
}

impl LocationReader for MemoryRecordStore {
    fn read_at(&self, location: u64) -> Result<Record, StoreError> {
        self.records
            .get(&location)
            .cloned()
            .ok_or_else(|| StoreError::Corrupted(format!("index points at missing record {location}")))
    }
}

impl RecordService for MemoryRecordStore {
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError> {
        self.validator.validate(&fields)?;
        let id = self.max_id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        self.append(Record::from_fields(id, fields));
        Ok(id)
    }

    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        self.validator.validate(&fields)?;
        if self.locate(id).is_some() {
            return Err(StoreError::DuplicateId { id });
        }
        self.append(Record::from_fields(id, fields));
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }

    fn live_count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn deleted_count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn total_count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        let seq = self.locate(id).ok_or(StoreError::NotFound { id })?;
        self.validator.validate(&fields)?;
        let updated = Record::from_fields(id, fields);
        if let Some(current) = self.records.get_mut(&seq) {
            self.index.reindex(seq, current, &updated);
            *current = updated;
        }
        debug!(id, seq, "record updated");
        Ok(())
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        let seq = self.locate(id).ok_or(StoreError::NotFound { id })?;
        self.remove_at(seq);
        debug!(id, seq, "record deleted");
        Ok(())
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.records.values().find(|r| r.id == id).cloned())
    }

    fn find_by_first_name(&self, name: &str) -> Lookup<'_> {
        Lookup::new(self.index.first_name(name), self)
    }

    fn find_by_last_name(&self, name: &str) -> Lookup<'_> {
        Lookup::new(self.index.last_name(name), self)
    }

    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_> {
        Lookup::new(self.index.date_of_birth(date), self)
    }

    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError> {
        let conditions = Conditions::parse(conditions.iter().map(|(k, v)| (k, v)))?;
        Ok(self
            .records
            .values()
            .filter(|r| conditions.matches(r))
            .cloned()
            .collect())
    }

    fn make_snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::new(self.records.values().cloned().collect()))
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError> {
        let mut errors = Vec::new();
        for record in snapshot {
            if let Err(err) = self.validator.validate(&record.fields()) {
                warn!(id = record.id, %err, "snapshot record rejected");
                errors.push(restore_rejection(record.id, &err));
                continue;
            }
            if let Some(seq) = self.locate(record.id) {
                self.remove_at(seq);
            }
            self.append(record.clone());
        }
        debug!(
            restored = snapshot.len() - errors.len(),
            rejected = errors.len(),
            "snapshot restored"
        );
        Ok(errors)
    }

    fn compact(&mut self) -> Result<usize, StoreError> {
        Err(StoreError::UnsupportedOperation {
            operation: "compact",
        })
    }
}
