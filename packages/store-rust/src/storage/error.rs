//! Error type shared by every [`RecordService`](super::RecordService) implementation.

use cabinet_core::{Field, QueryError, RecordId, RulesError, ValidationError};

use super::codec::CodecError;

/// Failure of a record store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The validator rejected the incoming field values. Nothing was changed.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: Field, reason: String },

    #[error("record #{id} not found")]
    NotFound { id: RecordId },

    #[error("record #{id} already exists")]
    DuplicateId { id: RecordId },

    #[error("unknown field: {name}")]
    UnknownField { name: String },

    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: Field, value: String },

    /// Every record id has been handed out.
    #[error("record id space exhausted")]
    IdsExhausted,

    /// The backend does not implement the operation.
    #[error("{operation} is not supported by this storage")]
    UnsupportedOperation { operation: &'static str },

    /// The backing file does not hold a well-formed sequence of slots.
    #[error("storage file is corrupted: {0}")]
    Corrupted(String),

    /// The configured validation rules are inconsistent.
    #[error("invalid validation rules: {0}")]
    Rules(#[from] RulesError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidField {
            field: err.field,
            reason: err.reason,
        }
    }
}

impl From<QueryError> for StoreError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnknownField { name } => Self::UnknownField { name },
            QueryError::InvalidValue { field, value } => Self::InvalidValue { field, value },
        }
    }
}

impl From<CodecError> for StoreError {
    fn from(err: CodecError) -> Self {
        Self::Corrupted(err.to_string())
    }
}
