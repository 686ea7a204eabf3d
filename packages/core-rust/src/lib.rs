//! File cabinet core: record model, snapshots, validation rules and field queries.

pub mod query;
pub mod schema;
pub mod snapshot;
pub mod types;

pub use query::{Condition, Conditions, Field, FieldValue, QueryError};
pub use schema::{
    AcceptAll, CompositeValidator, RecordValidator, RuleSet, RuleSetKind, RulesError,
    ValidationError, ValidationRules, ValidatorBuilder,
};
pub use snapshot::Snapshot;
pub use types::{Gender, Income, Record, RecordFields, RecordId};
