//! dailybatch - Fail-fast sequencer for daily batch jobs
//!
//! Runs an ordered catalog of process types through an external worker
//! program, once per process type, for a single target date. The first
//! failing step stops the run and the failure is reported through a
//! non-zero exit status so the scheduler that started us can alert.
//!
//! # Modules
//!
//! - `adapters`: Worker invocation (subprocess with merged output capture)
//! - `core`: BatchRunner, per-day log sink, per-date run lock
//! - `domain`: ProcessType, Catalog, TargetDate, RunContext, RunResult
//! - `config`: YAML configuration with profiles and env overrides
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the default profile for today
//! dailybatch run
//!
//! # Run a specific catalog for a given date
//! dailybatch run --profile catalog-b --target-date 20241105
//!
//! # Resume a failed day from the step that broke
//! dailybatch run --profile catalog-b --target-date 20241105 --start-from SEND_REBALCUS
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{CommandWorker, Worker, WorkerError, WorkerOutput, WorkerSettings};
pub use core::{BatchRunner, DailyLog, LogSink, MemoryLog, RunLock};
pub use domain::{Catalog, ProcessType, RunContext, RunEvent, RunResult, StepFailure, StepOutcome, TargetDate};
