//! Composable wrappers around a [`RecordService`](super::RecordService).
//!
//! - [`logging`]: Logs every call's arguments and outcome
//! - [`metering`]: Times every call inside a `tracing` span
//!
//! Both wrappers implement `RecordService` themselves, so they stack in any
//! order around either backend.

pub mod logging;
pub mod metering;

pub use logging::LoggingService;
pub use metering::MeteredService;
