//! Core batch execution.
//!
//! This module contains:
//! - BatchRunner: Sequential fail-fast execution engine
//! - LogSink: Append-only per-day run narrative
//! - RunLock: Exclusive per-date lock against overlapping runs

pub mod lock;
pub mod log_sink;
pub mod runner;

// Re-export commonly used types
pub use lock::{LockError, RunLock};
pub use log_sink::{DailyLog, LogEntry, LogSink, MemoryLog, TIMESTAMP_FORMAT};
pub use runner::BatchRunner;
