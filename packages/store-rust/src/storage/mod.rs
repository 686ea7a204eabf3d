//! Record storage for the file cabinet.
//!
//! Provides the service contract and everything behind it:
//!
//! - [`RecordService`]: the operations every backend and wrapper implements
//! - [`codec`]: the fixed-size binary slot format of the record file
//! - [`index`]: field-value indexes shared by both backends
//! - [`engines`]: the in-memory and file-backed implementations
//! - [`middleware`]: logging and timing wrappers
//! - [`factory`]: assembles a configured service

pub mod codec;
pub mod engines;
pub mod error;
pub mod factory;
pub mod index;
pub mod middleware;
pub mod record_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::StoreError;
pub use factory::StoreFactory;
pub use index::SecondaryIndex;
pub use record_store::*;
