//! Child process execution
//!
//! [`ProcessRunner`] spawns one [`Stage`] inside its workspace, pipes the
//! normalized input to it and drains both output streams into capped
//! buffers. [`TimeoutSupervisor`] then races the process against the
//! request deadline.

use std::ffi::OsString;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, instrument};

pub use crate::process::capture::{Capture, OutputBuffer, drain};
pub use crate::process::input::normalize_input;
pub use crate::process::supervisor::{Reaper, TimeoutSupervisor};

mod capture;
mod input;
mod supervisor;

use crate::config::Config;
use crate::language::Stage;
use crate::types::ProcessOutcome;

/// A started child with its output being drained
#[derive(Debug)]
pub struct SpawnedProcess {
    pub(crate) child: Child,
    pub(crate) pid: Option<u32>,
    pub(crate) program: String,
    pub(crate) stdout: OutputBuffer,
    pub(crate) stderr: OutputBuffer,
    /// Drain tasks for stdout and stderr, plus the stdin writer
    pub(crate) streams: JoinSet<()>,
    pub(crate) started: Instant,
}

impl SpawnedProcess {
    /// OS process id (also the process group id)
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Build the `PATH` value with `extra` appended to the inherited one
pub(crate) fn extended_path(extra: &[std::path::PathBuf]) -> io::Result<OsString> {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let paths = std::env::split_paths(&current).chain(extra.iter().cloned());
    std::env::join_paths(paths).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Spawns stages and supervises them until exit or deadline
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    max_output_bytes: usize,
    supervisor: TimeoutSupervisor,
}

impl ProcessRunner {
    pub fn new(max_output_bytes: usize, kill_grace: Duration) -> Self {
        Self {
            max_output_bytes,
            supervisor: TimeoutSupervisor::new(kill_grace),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_output_bytes, config.kill_grace())
    }

    pub fn supervisor(&self) -> &TimeoutSupervisor {
        &self.supervisor
    }

    /// Start `stage` without waiting for it
    ///
    /// The child leads its own process group so a timeout can terminate
    /// everything it started. `input` is written in full and stdin is then
    /// closed; with no input stdin is closed from the start.
    pub fn spawn(&self, stage: &Stage, input: Option<String>) -> io::Result<SpawnedProcess> {
        let program = stage.program();
        if program.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty command",
            ));
        }

        let mut command = Command::new(program);
        command
            .args(stage.args())
            .current_dir(&stage.working_dir)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        for var in &stage.env {
            command.env(&var.name, &var.value);
        }
        if !stage.extra_path.is_empty() {
            command.env("PATH", extended_path(&stage.extra_path)?);
        }

        let mut child = command.spawn()?;
        let pid = child.id();
        debug!(?pid, program, "process spawned");

        let stdout = OutputBuffer::new(self.max_output_bytes);
        let stderr = OutputBuffer::new(self.max_output_bytes);
        let mut streams = JoinSet::new();

        if let Some(out) = child.stdout.take() {
            streams.spawn(drain(out, stdout.clone()));
        }
        if let Some(err) = child.stderr.take() {
            streams.spawn(drain(err, stderr.clone()));
        }
        if let (Some(mut stdin), Some(data)) = (child.stdin.take(), input) {
            streams.spawn(async move {
                // A program that exits without reading closes the pipe early
                if let Err(e) = stdin.write_all(data.as_bytes()).await {
                    debug!(error = %e, "stdin write interrupted");
                }
                let _ = stdin.shutdown().await;
            });
        }

        Ok(SpawnedProcess {
            child,
            pid,
            program: program.to_owned(),
            stdout,
            stderr,
            streams,
            started: Instant::now(),
        })
    }

    /// Run `stage` to completion or until `deadline`
    ///
    /// Spawn failures are reported as a [`ProcessOutcome`] with status
    /// `SpawnFailed`, never as a program exit code.
    #[instrument(skip(self, stage, input), fields(stage = stage.kind.as_str(), program = stage.program()))]
    pub async fn run(
        &self,
        stage: &Stage,
        input: Option<String>,
        deadline: Instant,
    ) -> ProcessOutcome {
        if Instant::now() >= deadline {
            return ProcessOutcome::out_of_time();
        }
        match self.spawn(stage, input) {
            Ok(process) => self.supervisor.with_deadline(process, deadline).await,
            Err(e) => {
                debug!(error = %e, "spawn failed");
                ProcessOutcome::spawn_failed(stage.program(), &e)
            }
        }
    }
}
