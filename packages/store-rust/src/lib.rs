//! File cabinet store: record services over an in-memory or slot-file backend,
//! with secondary indexes, compaction, snapshots and call wrappers.

pub mod config;
pub mod storage;
pub mod telemetry;

pub use config::{BackendKind, StoreConfig};
pub use storage::engines::{FileRecordStore, MemoryRecordStore};
pub use storage::middleware::{LoggingService, MeteredService};
pub use storage::{Lookup, RecordService, StoreError, StoreFactory};
pub use telemetry::{init_tracing, LogFormat, LoggingConfig};
