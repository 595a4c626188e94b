//! Domain types for the batch runner.
//!
//! This module contains the core data structures:
//! - ProcessType / Catalog: what runs, in which order
//! - TargetDate: the business date being processed
//! - RunContext / StepOutcome / RunResult: run inputs and results
//! - RunEvent: step transitions written to the day's log

pub mod date;
pub mod events;
pub mod process;
pub mod run;

// Re-export commonly used types
pub use date::{TargetDate, TargetDateError};
pub use events::RunEvent;
pub use process::{Catalog, CatalogError, ProcessType};
pub use run::{RunContext, RunResult, StepFailure, StepOutcome};
