//! Call logging wrapper for record services.

use cabinet_core::{Record, RecordFields, RecordId, Snapshot};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::storage::error::StoreError;
use crate::storage::record_store::{Lookup, RecordService};

fn log_outcome<T>(operation: &'static str, result: &Result<T, StoreError>, summary: impl FnOnce(&T) -> String) {
    match result {
        Ok(value) => info!(operation, returned = %summary(value), "call returned"),
        Err(err) => warn!(operation, %err, "call failed"),
    }
}

fn log_fields(operation: &'static str, id: Option<RecordId>, fields: &RecordFields) {
    info!(
        operation,
        id,
        first_name = %fields.first_name,
        last_name = %fields.last_name,
        date_of_birth = %fields.date_of_birth,
        dependents = fields.dependents,
        income = %fields.income,
        gender = %fields.gender,
        "calling"
    );
}

/// Record service wrapper that logs each call's arguments before forwarding
/// it and the returned value or error afterwards.
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S> LoggingService<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RecordService> RecordService for LoggingService<S> {
    fn create(&mut self, fields: RecordFields) -> Result<RecordId, StoreError> {
        log_fields("create", None, &fields);
        let result = self.inner.create(fields);
        log_outcome("create", &result, ToString::to_string);
        result
    }

    fn insert(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        log_fields("insert", Some(id), &fields);
        let result = self.inner.insert(id, fields);
        log_outcome("insert", &result, |_| String::new());
        result
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        info!(operation = "get_all", "calling");
        let result = self.inner.get_all();
        log_outcome("get_all", &result, |records| format!("{} records", records.len()));
        result
    }

    fn live_count(&self) -> Result<usize, StoreError> {
        info!(operation = "live_count", "calling");
        let result = self.inner.live_count();
        log_outcome("live_count", &result, ToString::to_string);
        result
    }

    fn deleted_count(&self) -> Result<usize, StoreError> {
        info!(operation = "deleted_count", "calling");
        let result = self.inner.deleted_count();
        log_outcome("deleted_count", &result, ToString::to_string);
        result
    }

    fn total_count(&self) -> Result<usize, StoreError> {
        info!(operation = "total_count", "calling");
        let result = self.inner.total_count();
        log_outcome("total_count", &result, ToString::to_string);
        result
    }

    fn update(&mut self, id: RecordId, fields: RecordFields) -> Result<(), StoreError> {
        log_fields("update", Some(id), &fields);
        let result = self.inner.update(id, fields);
        log_outcome("update", &result, |_| String::new());
        result
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        info!(operation = "delete", id, "calling");
        let result = self.inner.delete(id);
        log_outcome("delete", &result, |_| String::new());
        result
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        info!(operation = "find_by_id", id, "calling");
        let result = self.inner.find_by_id(id);
        log_outcome("find_by_id", &result, |found| {
            found.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
        });
        result
    }

    fn find_by_first_name(&self, name: &str) -> Lookup<'_> {
        info!(operation = "find_by_first_name", name, "calling");
        let lookup = self.inner.find_by_first_name(name);
        info!(operation = "find_by_first_name", matches = lookup.len(), "call returned");
        lookup
    }

    fn find_by_last_name(&self, name: &str) -> Lookup<'_> {
        info!(operation = "find_by_last_name", name, "calling");
        let lookup = self.inner.find_by_last_name(name);
        info!(operation = "find_by_last_name", matches = lookup.len(), "call returned");
        lookup
    }

    fn find_by_date_of_birth(&self, date: NaiveDate) -> Lookup<'_> {
        info!(operation = "find_by_date_of_birth", %date, "calling");
        let lookup = self.inner.find_by_date_of_birth(date);
        info!(operation = "find_by_date_of_birth", matches = lookup.len(), "call returned");
        lookup
    }

    fn query_by_fields(&self, conditions: &[(String, String)]) -> Result<Vec<Record>, StoreError> {
        info!(operation = "query_by_fields", ?conditions, "calling");
        let result = self.inner.query_by_fields(conditions);
        log_outcome("query_by_fields", &result, |records| format!("{} records", records.len()));
        result
    }

    fn make_snapshot(&self) -> Result<Snapshot, StoreError> {
        info!(operation = "make_snapshot", "calling");
        let result = self.inner.make_snapshot();
        log_outcome("make_snapshot", &result, |snapshot| format!("{} records", snapshot.len()));
        result
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<Vec<String>, StoreError> {
        info!(operation = "restore", records = snapshot.len(), "calling");
        let result = self.inner.restore(snapshot);
        log_outcome("restore", &result, |errors| format!("{} rejected", errors.len()));
        result
    }

    fn compact(&mut self) -> Result<usize, StoreError> {
        info!(operation = "compact", "calling");
        let result = self.inner.compact();
        log_outcome("compact", &result, |reclaimed| format!("{reclaimed} reclaimed"));
        result
    }
}
