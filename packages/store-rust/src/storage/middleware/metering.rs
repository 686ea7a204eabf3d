//! Timing wrapper for record services.
//!
//! Records each call's duration and outcome on a `tracing` span rather than
//! through a metrics crate.

use std::time::Instant;

use cabinet_core::{Record, RecordFields, RecordId, Snapshot};
use chrono::NaiveDate;
use tracing::{field, info, info_span};

use crate::storage::error::StoreError;
use crate::storage::record_store::{Lookup, RecordService};

/// Runs `call` inside an operation span and emits an `"operation complete"` event.
fn timed<T>(operation: &'static str, call: impl FnOnce() -> T, succeeded: impl FnOnce(&T) -> bool) -> T {
    let span = info_span!(
        "record_operation",
        operation,
        duration_us = field::Empty,
        outcome = field::Empty,
    );
    let _entered = span.enter();

    let start = Instant::now();
    let result = call();
    let duration_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    let outcome = if succeeded(&result) { "ok" } else { "error" };

    span.record("duration_us", duration_us);
    span.record("outcome", outcome);
    info!(operation, duration_us, outcome, "operation complete");
    result
}

fn metered<T>(operation: &'static str, call: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
    timed(operation, call, Result::is_ok)
}

/// Record service wrapper that times every call.
#[derive(Debug, Clone)]
pub struct MeteredService<S> {
    inner: S,
}

impl<S> MeteredService<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Unwraps the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordService> RecordService for MeteredService<S> {
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError> {
        metered("create", || self.inner.create(fields))
    }

    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        metered("insert", || self.inner.insert(id, fields))
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        metered("get_all", || self.inner.get_all())
    }

    fn live_count(&self) -> Result<usize, StoreError> {
        metered("live_count", || self.inner.live_count())
    }

    fn deleted_count(&self) -> Result<usize, StoreError> {
        metered("deleted_count", || self.inner.deleted_count())
    }

    fn total_count(&self) -> Result<usize, StoreError> {
        metered("total_count", || self.inner.total_count())
    }

    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        metered("update", || self.inner.update(id, fields))
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        metered("delete", || self.inner.delete(id))
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        metered("find_by_id", || self.inner.find_by_id(id))
    }

    fn find_by_first_name(&self, name: &str) -> Lookup<'_> {
        timed("find_by_first_name", || self.inner.find_by_first_name(name), |_| true)
    }

    fn find_by_last_name(&self, name: &str) -> Lookup<'_> {
        timed("find_by_last_name", || self.inner.find_by_last_name(name), |_| true)
    }

    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_> {
        timed("find_by_date_of_birth", || self.inner.find_by_date_of_birth(date), |_| true)
    }

    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError> {
        metered("query_by_fields", || self.inner.query_by_fields(conditions))
    }

    fn make_snapshot(&self) -> Result<Snapshot, StoreError> {
        metered("make_snapshot", || self.inner.make_snapshot())
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError> {
        metered("restore", || self.inner.restore(snapshot))
    }

    fn compact(&mut self) -> Result<usize, StoreError> {
        metered("compact", || self.inner.compact())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engines::MemoryRecordStore;
    use crate::storage::testing::{default_validator, fields, CapturedLog};

    fn metered_store() -> MeteredService<MemoryRecordStore> {
        MeteredService::new(MemoryRecordStore::new(default_validator()))
    }

    #[test]
    fn passes_results_through() {
        let mut service = metered_store();
        assert_eq!(service.create(fields("Ann", "Lee")).unwrap(), 1);
        assert_eq!(service.find_by_first_name("ann").len(), 1);
        assert!(matches!(
            service.delete(9),
            Err(StoreError::NotFound { id: 9 })
        ));
        assert!(matches!(
            service.compact(),
            Err(StoreError::UnsupportedOperation { .. })
        ));
        assert_eq!(service.into_inner().live_count().unwrap(), 1);
    }

    #[test]
    fn emits_completion_event_with_outcome() {
        let log = CapturedLog::default();
        tracing::subscriber::with_default(log.subscriber(), || {
            let mut service = metered_store();
            service.create(fields("Ann", "Lee")).unwrap();
            let _ = service.delete(42);
        });

        let text = log.text();
        assert!(text.contains("operation complete"), "{text}");
        assert!(text.contains("operation=\"create\""), "{text}");
        assert!(text.contains("outcome=\"ok\""), "{text}");
        assert!(text.contains("outcome=\"error\""), "{text}");
    }
}
