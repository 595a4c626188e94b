//! Worker interface for the external batch program.
//!
//! The runner only depends on the `Worker` trait: invoke once per process
//! type, block until it terminates, get back an exit status and the
//! combined stdout/stderr text. `CommandWorker` is the subprocess
//! implementation; tests substitute a fake.

pub mod command;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ProcessType, StepFailure, StepOutcome, TargetDate};

pub use command::{CommandWorker, WorkerSettings, DEFAULT_WORKER_ARGS};

/// Output from a worker invocation that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Signal number when killed by a signal (unix only)
    pub signal: Option<i32>,

    /// stdout and stderr merged in arrival order
    pub output: String,
}

impl WorkerOutput {
    /// Create an output for a process that exited normally
    pub fn exited(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            signal: None,
            output: output.into(),
        }
    }

    /// Classify the termination: exit code 0 succeeds, anything else fails
    pub fn outcome(&self) -> StepOutcome {
        match self.exit_code {
            Some(code) => StepOutcome::from_exit_code(code),
            None => StepOutcome::Failure(StepFailure::Terminated {
                signal: self.signal,
            }),
        }
    }
}

/// Errors that prevent a worker from reporting an exit status
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to launch worker '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Worker timed out after {after:?}")]
    TimedOut {
        after: Duration,
        /// Output captured before the worker was killed
        output: String,
    },

    #[error("Failed while waiting for worker: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Output the worker produced before the error, if any
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::TimedOut { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<&WorkerError> for StepFailure {
    fn from(error: &WorkerError) -> Self {
        match error {
            WorkerError::Launch { program, source } => StepFailure::LaunchFailed {
                reason: format!("{}: {}", program, source),
            },
            WorkerError::TimedOut { after, .. } => StepFailure::TimedOut { after: *after },
            WorkerError::Io(e) => StepFailure::Unobserved {
                reason: e.to_string(),
            },
        }
    }
}

/// Trait for the external program that performs one process type
#[async_trait]
pub trait Worker: Send + Sync {
    /// Human-readable worker name
    fn name(&self) -> &str;

    /// Run the worker for one process type and wait for it to terminate
    async fn invoke(
        &self,
        target_date: &TargetDate,
        process_type: &ProcessType,
    ) -> Result<WorkerOutput, WorkerError>;
}
