//! Record builders shared by the storage tests.

use std::io;
use std::sync::Arc;

use cabinet_core::{
    Gender, Income, RecordFields, RecordValidator, RuleSetKind, ValidationRules, ValidatorBuilder,
};
use chrono::NaiveDate;
use parking_lot::Mutex;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Fields that pass the built-in default rules.
pub(crate) fn fields(first: &str, last: &str) -> RecordFields {
    RecordFields {
        first_name: first.to_string(),
        last_name: last.to_string(),
        date_of_birth: date(1980, 1, 1),
        dependents: 1,
        income: Income::from_whole(1000),
        gender: Gender::new('M'),
    }
}

/// Fields the built-in default rules reject (blank first name).
pub(crate) fn invalid_fields() -> RecordFields {
    fields("", "Nobody")
}

/// Validator for the built-in default rule set, evaluated against a fixed date.
pub(crate) fn default_validator() -> Arc<dyn RecordValidator> {
    let rules = ValidationRules::builtin().unwrap();
    Arc::new(ValidatorBuilder::from_rule_set(rules.get(RuleSetKind::Default), date(2024, 6, 1)).unwrap())
}

/// In-memory sink for `tracing-subscriber` output.
#[derive(Clone, Default)]
pub(crate) struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    /// A plain-text subscriber writing into this sink.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
