//! Sequential fail-fast batch runner.
//!
//! Executes a catalog's process types strictly in order through a
//! `Worker`, recording every step transition to a `LogSink`. The first
//! failing step ends the run; later process types are neither invoked nor
//! logged.

use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::adapters::Worker;
use crate::domain::{
    ProcessType, RunContext, RunEvent, RunResult, StepFailure, StepOutcome, TargetDate,
};

use super::log_sink::LogSink;

/// Runs a catalog against a worker, one process type at a time
pub struct BatchRunner<W, S> {
    /// External program invoked per process type
    worker: W,

    /// Destination for the run narrative
    sink: S,
}

impl<W: Worker, S: LogSink> BatchRunner<W, S> {
    /// Create a runner
    pub fn new(worker: W, sink: S) -> Self {
        Self { worker, sink }
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the runner, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Execute every process type in order, stopping at the first failure.
    ///
    /// Worker failures are reported through `RunResult::AbortedAt`; an `Err`
    /// means the log sink itself could not be written.
    #[instrument(
        skip(self, context),
        fields(run_id = %context.run_id, target_date = %context.target_date, worker = %self.worker.name())
    )]
    pub async fn run(&mut self, context: &RunContext) -> Result<RunResult> {
        info!(steps = context.catalog.len(), catalog = %context.catalog, "Starting batch run");

        for process_type in &context.catalog {
            let outcome = self.execute_step(&context.target_date, process_type).await?;

            if let StepOutcome::Failure(failure) = outcome {
                error!(
                    process_type = %process_type,
                    exit_code = failure.exit_code(),
                    "Batch run aborted"
                );
                return Ok(RunResult::AbortedAt {
                    process_type: process_type.clone(),
                    failure,
                });
            }
        }

        self.sink.record(&RunEvent::RunCompleted).await?;
        info!("All processes completed");

        Ok(RunResult::CompletedAll)
    }

    /// Invoke the worker for one process type and log its transition
    async fn execute_step(
        &mut self,
        target_date: &TargetDate,
        process_type: &ProcessType,
    ) -> Result<StepOutcome> {
        self.sink
            .record(&RunEvent::StepStarted(process_type.clone()))
            .await?;
        info!(process_type = %process_type, "Starting step");

        let step_start = Instant::now();
        let outcome = match self.worker.invoke(target_date, process_type).await {
            Ok(output) => {
                self.sink.capture(&output.output).await?;
                output.outcome()
            }
            Err(e) => {
                if let Some(partial) = e.partial_output() {
                    self.sink.capture(partial).await?;
                }
                error!(process_type = %process_type, error = %e, "Worker invocation failed");
                StepOutcome::Failure(StepFailure::from(&e))
            }
        };
        let duration_ms = step_start.elapsed().as_millis() as u64;

        match outcome {
            StepOutcome::Success => {
                self.sink
                    .record(&RunEvent::StepCompleted(process_type.clone()))
                    .await?;
                info!(process_type = %process_type, duration_ms, "Step completed");
            }
            StepOutcome::Failure(ref failure) => {
                self.sink
                    .record(&RunEvent::StepFailed(process_type.clone(), failure.clone()))
                    .await?;
                error!(
                    process_type = %process_type,
                    duration_ms,
                    failure = %failure,
                    "Step failed"
                );
            }
        }

        Ok(outcome)
    }
}
