//! Record service contract.
//!
//! Defines [`RecordService`], the interface every storage backend and every
//! wrapper implements, together with [`Lookup`], the lazy result of an
//! indexed field lookup.
//!
//! All operations are synchronous. Mutations take `&mut self`; reads take
//! `&self`. A service is owned by exactly one caller and handed down
//! explicitly as `Box<dyn RecordService>`.

use std::fmt;

use cabinet_core::{Record, RecordFields, RecordId, Snapshot, ValidationError};
use chrono::NaiveDate;

use super::error::StoreError;

/// Reads the record stored at a backend-specific location.
///
/// Locations come from a backend's secondary index: a sequence number for
/// the in-memory backend, a slot byte offset for the file backend.
pub trait LocationReader {
    /// Reads the record at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Corrupted`] if the location
    /// cannot be read back.
    fn read_at(&self, location: u64) -> Result<Record, StoreError>;
}

/// Lazy result of an indexed lookup.
///
/// Holds the matching locations and reads each record only when the
/// iterator reaches it. A `Lookup` is `Copy`, so the sequence can be walked
/// again from the start as often as needed.
#[derive(Clone, Copy)]
pub struct Lookup<'a> {
    locations: &'a [u64],
    reader: &'a dyn LocationReader,
}

impl<'a> Lookup<'a> {
    #[must_use]
    pub fn new(locations: &'a [u64], reader: &'a dyn LocationReader) -> Self {
        Self { locations, reader }
    }

    /// Number of matching records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Starts a fresh pass over the matching records.
    #[must_use]
    pub fn iter(&self) -> LookupIter<'a> {
        LookupIter {
            locations: self.locations.iter(),
            reader: self.reader,
        }
    }

    /// Reads every matching record.
    ///
    /// # Errors
    ///
    /// Returns the first read failure.
    pub fn to_vec(&self) -> Result<Vec<Record>, StoreError> {
        self.iter().collect()
    }
}

impl fmt::Debug for Lookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("locations", &self.locations)
            .finish_non_exhaustive()
    }
}

impl<'a> IntoIterator for Lookup<'a> {
    type Item = Result<Record, StoreError>;
    type IntoIter = LookupIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the records of a [`Lookup`].
pub struct LookupIter<'a> {
    locations: std::slice::Iter<'a, u64>,
    reader: &'a dyn LocationReader,
}

impl Iterator for LookupIter<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.locations
            .next()
            .map(|location| self.reader.read_at(*location))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.locations.size_hint()
    }
}

impl ExactSizeIterator for LookupIter<'_> {}

/// Formats the message recorded for a snapshot record the validator rejected.
#[must_use]
pub fn restore_rejection(id: RecordId, err: &ValidationError) -> String {
    format!("Record #{id} didn't pass validation: {err}")
}

/// Storage service for personal records.
///
/// Implemented by the in-memory and file backends and by the logging and
/// metering wrappers, which forward to an inner service.
///
/// Every mutation runs the configured validator on the incoming fields first;
/// a rejected record fails with [`StoreError::InvalidField`] and nothing is
/// changed.
pub trait RecordService: Send {
    /// Stores a new record under the next free id and returns that id.
    ///
    /// Ids are strictly increasing for the life of this store instance, even
    /// across deletes. A file store seeds its counter from the largest live id
    /// when opened, so an id deleted from the end of the file in an earlier
    /// session can be handed out again.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidField`] if validation fails, or an I/O error.
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError>;

    /// Stores a record under a caller-chosen id.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidField`] if validation fails,
    /// [`StoreError::DuplicateId`] if a live record already has `id`.
    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError>;

    /// Returns every live record in storage order.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn get_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Number of live records.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn live_count(&self) -> Result<usize, StoreError>;

    /// Number of tombstoned records awaiting compaction.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn deleted_count(&self) -> Result<usize, StoreError>;

    /// Number of stored slots, live or tombstoned.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn total_count(&self) -> Result<usize, StoreError>;

    /// Replaces the fields of the live record `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no live record has `id`,
    /// [`StoreError::InvalidField`] if validation fails.
    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError>;

    /// Deletes the live record `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no live record has `id`.
    fn delete(&mut self, id: RecordId) -> Result<(), StoreError>;

    /// Returns the live record `id`, if any.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Live records whose first name matches, ignoring case.
    fn find_by_first_name(&self, name: &str) -> Lookup<'_>;

    /// Live records whose last name matches, ignoring case.
    fn find_by_last_name(&self, name: &str) -> Lookup<'_>;

    /// Live records born on `date`.
    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_>;

    /// Live records matching every `(field, value)` condition.
    ///
    /// An empty condition list matches every live record.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownField`] or [`StoreError::InvalidValue`] if a
    /// condition cannot be parsed.
    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError>;

    /// Captures every live record.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn make_snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Loads a snapshot, replacing records that share an id.
    ///
    /// Records the validator rejects are skipped; one message per rejected
    /// record is returned. A later entry in the snapshot wins over an earlier
    /// one with the same id.
    ///
    /// # Errors
    ///
    /// Only I/O and corruption failures abort a restore.
    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError>;

    /// Reclaims the space of tombstoned records. Returns how many were reclaimed.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnsupportedOperation`] on backends without tombstones.
    fn compact(&mut self) -> Result<usize, StoreError>;
}

impl<S: RecordService + ?Sized> RecordService for Box<S> {
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError> {
        (**self).create(fields)
    }

    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        (**self).insert(id, fields)
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        (**self).get_all()
    }

    fn live_count(&self) -> Result<usize, StoreError> {
        (**self).live_count()
    }

    fn deleted_count(&self) -> Result<usize, StoreError> {
        (**self).deleted_count()
    }

    fn total_count(&self) -> Result<usize, StoreError> {
        (**self).total_count()
    }

    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        (**self).update(id, fields)
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_first_name(&self, name: &str) -> Lookup<'_> {
        (**self).find_by_first_name(name)
    }

    fn find_by_last_name(&self, name: &str) -> Lookup<'_> {
        (**self).find_by_last_name(name)
    }

    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_> {
        (**self).find_by_date_of_birth(date)
    }

    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError> {
        (**self).query_by_fields(conditions)
    }

    fn make_snapshot(&self) -> Result<Snapshot, StoreError> {
        (**self).make_snapshot()
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError> {
        (**self).restore(snapshot)
    }

    fn compact(&mut self) -> Result<usize, StoreError> {
        (**self).compact()
    }
}
