//! Step transition events written to the day's log.

use std::fmt;

use super::process::ProcessType;
use super::run::StepFailure;

/// A runner-emitted event, one line in the log sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Worker is about to be invoked for this process type
    StepStarted(ProcessType),

    /// Worker returned success
    StepCompleted(ProcessType),

    /// Worker failed; the run stops here
    StepFailed(ProcessType, StepFailure),

    /// Every process type in the catalog succeeded
    RunCompleted,
}

impl RunEvent {
    /// Whether a blank separator line follows this event in the log
    pub fn separated(&self) -> bool {
        matches!(self, Self::StepCompleted(_))
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepStarted(p) => write!(f, "Starting {}", p),
            Self::StepCompleted(p) => write!(f, "Completed {}", p),
            Self::StepFailed(p, _) => write!(f, "ERROR: Process failed for {}", p),
            Self::RunCompleted => f.write_str("All processes completed"),
        }
    }
}
