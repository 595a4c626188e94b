//! Run context, step outcomes and the aggregate run result.
//!
//! A run is a single pass over a catalog for one target date. Its result is
//! derived purely from the step outcomes: the first failure, or
//! `CompletedAll` if none occurred.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::date::TargetDate;
use super::process::{Catalog, ProcessType};

/// Exit code reported when a worker could not be started at all
pub const LAUNCH_FAILED_CODE: i32 = 127;

/// Exit code reported when a worker exceeded its step deadline
pub const TIMED_OUT_CODE: i32 = 124;

/// Immutable inputs of a single run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Correlates tracing output for this run
    pub run_id: Uuid,

    /// Business date handed to every worker invocation
    pub target_date: TargetDate,

    /// Ordered process types to execute
    pub catalog: Catalog,
}

impl RunContext {
    pub fn new(target_date: TargetDate, catalog: Catalog) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target_date,
            catalog,
        }
    }
}

/// Why a single worker invocation did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepFailure {
    #[error("exited with code {code}")]
    Exited { code: i32 },

    #[error("terminated by signal {}", signal_label(.signal))]
    Terminated { signal: Option<i32> },

    #[error("could not be launched: {reason}")]
    LaunchFailed { reason: String },

    #[error("timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("exit status could not be observed: {reason}")]
    Unobserved { reason: String },
}

fn signal_label(signal: &Option<i32>) -> String {
    signal
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl StepFailure {
    /// Status code this failure is reported with
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exited { code } => *code,
            Self::Terminated { signal: Some(sig) } => 128 + sig,
            Self::Terminated { signal: None } => 1,
            Self::LaunchFailed { .. } => LAUNCH_FAILED_CODE,
            Self::TimedOut { .. } => TIMED_OUT_CODE,
            Self::Unobserved { .. } => 1,
        }
    }
}

/// Result of executing one process type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(StepFailure),
}

impl StepOutcome {
    /// Classify a worker exit status: zero is success, anything else fails
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            Self::Success
        } else {
            Self::Failure(StepFailure::Exited { code })
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunResult {
    /// Every process type succeeded
    CompletedAll,

    /// The run stopped at the first failing process type
    AbortedAt {
        process_type: ProcessType,
        failure: StepFailure,
    },
}

impl RunResult {
    /// Code of the failing step, or 0 when everything completed
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CompletedAll => 0,
            Self::AbortedAt { failure, .. } => failure.exit_code(),
        }
    }

    /// Status the runner itself reports to its invoker (e.g. cron)
    pub fn process_exit_code(&self) -> u8 {
        match self {
            Self::CompletedAll => 0,
            Self::AbortedAt { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::CompletedAll)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompletedAll => f.write_str("completed all process types"),
            Self::AbortedAt {
                process_type,
                failure,
            } => write!(f, "aborted at {}: {}", process_type, failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(StepOutcome::from_exit_code(0), StepOutcome::Success);
        assert_eq!(
            StepOutcome::from_exit_code(3),
            StepOutcome::Failure(StepFailure::Exited { code: 3 })
        );
        assert!(!StepOutcome::from_exit_code(-1).is_success());
    }

    #[test]
    fn test_failure_exit_codes() {
        assert_eq!(StepFailure::Exited { code: 2 }.exit_code(), 2);
        assert_eq!(StepFailure::Terminated { signal: Some(9) }.exit_code(), 137);
        assert_eq!(StepFailure::Terminated { signal: None }.exit_code(), 1);
        assert_eq!(
            StepFailure::LaunchFailed {
                reason: "not found".to_string()
            }
            .exit_code(),
            127
        );
        assert_eq!(
            StepFailure::TimedOut {
                after: Duration::from_secs(5)
            }
            .exit_code(),
            124
        );
        assert_eq!(
            StepFailure::Unobserved {
                reason: "wait failed".to_string()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_run_result_exit_codes() {
        let aborted = RunResult::AbortedAt {
            process_type: ProcessType::new("SEND_REPORT").unwrap(),
            failure: StepFailure::Exited { code: 2 },
        };

        assert_eq!(RunResult::CompletedAll.process_exit_code(), 0);
        assert_eq!(aborted.process_exit_code(), 1);
        assert_eq!(aborted.exit_code(), 2);
        assert_eq!(aborted.to_string(), "aborted at SEND_REPORT: exited with code 2");
    }

    #[test]
    fn test_run_result_serialization() {
        let aborted = RunResult::AbortedAt {
            process_type: ProcessType::new("RECEIVE_ACCOUNT").unwrap(),
            failure: StepFailure::Exited { code: 1 },
        };

        let json = serde_json::to_value(&aborted).unwrap();
        assert_eq!(json["status"], "aborted_at");
        assert_eq!(json["process_type"], "RECEIVE_ACCOUNT");
        assert_eq!(json["failure"]["kind"], "exited");
        assert_eq!(json["failure"]["code"], 1);
    }
}
