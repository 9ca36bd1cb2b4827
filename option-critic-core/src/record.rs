//! Types for recording and logging training metrics.
mod base;
mod logger;
pub use base::{Record, RecordValue};
pub use logger::Logger;
