//! Subprocess worker.
//!
//! Spawns the configured program once per process type, substituting the
//! target date and process type into its argument template. stdout and
//! stderr are read concurrently and merged in arrival order so the day's
//! log shows the worker's diagnostics where they happened.
//!
//! A step ends when the worker process exits. Output still in flight is
//! collected for a short grace period afterwards; a background descendant
//! holding the pipes open does not keep the step running. On unix the
//! worker leads its own process group so a timeout kills everything it
//! started.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::{Worker, WorkerError, WorkerOutput};
use crate::domain::{ProcessType, TargetDate};

/// Argument template used when the config does not provide one
pub const DEFAULT_WORKER_ARGS: [&str; 4] = [
    "--target_date",
    "{target_date}",
    "--process_type",
    "{process_type}",
];

/// How long to keep reading output after the worker has exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

const TARGET_DATE_PLACEHOLDER: &str = "{target_date}";
const PROCESS_TYPE_PLACEHOLDER: &str = "{process_type}";

/// How to launch the worker program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSettings {
    /// Program to execute (looked up on PATH if not absolute)
    pub program: String,

    /// Argument template; `{target_date}` and `{process_type}` are substituted
    pub args: Vec<String>,

    /// Working directory for the worker (inherits ours if unset)
    pub working_dir: Option<PathBuf>,

    /// Per-step deadline, `None` waits indefinitely
    pub step_timeout: Option<Duration>,
}

impl WorkerSettings {
    /// Settings with the default argument template and no timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: DEFAULT_WORKER_ARGS.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
            step_timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Argument list for one invocation
    pub fn render_args(&self, target_date: &TargetDate, process_type: &ProcessType) -> Vec<String> {
        let date = target_date.compact();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(TARGET_DATE_PLACEHOLDER, &date)
                    .replace(PROCESS_TYPE_PLACEHOLDER, process_type.as_str())
            })
            .collect()
    }
}

/// Worker that runs an external program as a subprocess
pub struct CommandWorker {
    settings: WorkerSettings,
}

impl CommandWorker {
    pub fn new(settings: WorkerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    async fn execute_subprocess(
        &self,
        target_date: &TargetDate,
        process_type: &ProcessType,
    ) -> Result<WorkerOutput, WorkerError> {
        let args = self.settings.render_args(target_date, process_type);
        debug!(program = %self.settings.program, ?args, "Spawning worker");

        let mut command = Command::new(&self.settings.program);
        command
            .args(&args)
            .env("BATCH_TARGET_DATE", target_date.compact())
            .env("BATCH_PROCESS_TYPE", process_type.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.settings.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| WorkerError::Launch {
            program: self.settings.program.clone(),
            source,
        })?;

        // Both streams feed one channel so lines keep their arrival order
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let deadline = deadline(self.settings.step_timeout);
        tokio::pin!(deadline);

        let mut output = String::new();
        let mut streams_open = true;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                line = rx.recv(), if streams_open => match line {
                    Some(line) => output.push_str(&line),
                    None => streams_open = false,
                },
                _ = &mut deadline => return self.kill_timed_out(&mut child, output).await,
            }
        };

        if streams_open {
            drain_output(&mut rx, &mut output).await;
        }

        Ok(WorkerOutput {
            exit_code: status.code(),
            signal: exit_signal(&status),
            output,
        })
    }

    async fn kill_timed_out(
        &self,
        child: &mut Child,
        output: String,
    ) -> Result<WorkerOutput, WorkerError> {
        let after = self.settings.step_timeout.unwrap_or_default();
        warn!(program = %self.settings.program, ?after, "Worker exceeded step timeout, killing");

        kill_process_group(child);

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill timed out worker");
        }

        Err(WorkerError::TimedOut { after, output })
    }
}

#[async_trait]
impl Worker for CommandWorker {
    fn name(&self) -> &str {
        &self.settings.program
    }

    async fn invoke(
        &self,
        target_date: &TargetDate,
        process_type: &ProcessType,
    ) -> Result<WorkerOutput, WorkerError> {
        self.execute_subprocess(target_date, process_type).await
    }
}

/// Resolves after `timeout`, or never when there is none
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

/// Collect output that arrives after exit, until the pipes close or the
/// grace period ends
async fn drain_output(rx: &mut UnboundedReceiver<String>, output: &mut String) {
    let grace = tokio::time::sleep(OUTPUT_DRAIN_GRACE);
    tokio::pin!(grace);

    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => output.push_str(&line),
                None => return,
            },
            _ = &mut grace => {
                debug!("Worker output still held open after exit, detaching");
                return;
            }
        }
    }
}

/// SIGKILL the worker's process group, which `process_group(0)` keyed to
/// its pid
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        warn!(error = %e, pgid, "Failed to kill worker process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Forward newline-terminated lines from a worker stream, lossily decoded
async fn forward_lines<R>(stream: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let mut line = String::from_utf8_lossy(&buf).into_owned();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read worker output");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
