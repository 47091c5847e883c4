//! Deadline enforcement and process reaping

use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

use crate::process::SpawnedProcess;
use crate::types::{OutcomeStatus, ProcessOutcome};

/// Shortest time output streams get to close after the process exits
const MIN_DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Send `signal` to the process group led by `pid`
///
/// Errors are ignored: the group may already be gone.
fn signal_group(pid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), signal) {
        debug!(pid, ?signal, error = %e, "signal not delivered");
    }
}

/// Background terminator for timed-out processes
///
/// Each handed-over child already received SIGTERM. The reaper waits up to
/// the grace period for it to exit, then SIGKILLs its whole group and
/// reaps it. Tasks are tracked so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct Reaper {
    tracker: TaskTracker,
    grace: Duration,
}

impl Reaper {
    pub fn new(grace: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            grace,
        }
    }

    /// Take ownership of a signalled child and make sure it dies
    pub fn reap(&self, mut child: Child, pid: Option<u32>) {
        let grace = self.grace;
        self.tracker.spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    debug!(?pid, ?status, "terminated process reaped");
                    // Stragglers left in the group
                    if let Some(pid) = pid {
                        signal_group(pid, Signal::SIGKILL);
                    }
                }
                _ = tokio::time::sleep(grace) => {
                    warn!(?pid, grace_ms = grace.as_millis() as u64, "process survived SIGTERM, sending SIGKILL");
                    match pid {
                        Some(pid) => signal_group(pid, Signal::SIGKILL),
                        None => {
                            let _ = child.start_kill();
                        }
                    }
                    if let Err(e) = child.wait().await {
                        warn!(?pid, error = %e, "failed to reap killed process");
                    }
                }
            }
        });
    }

    /// Number of processes still being terminated
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait for outstanding terminations
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

/// Races a spawned process against a deadline
#[derive(Debug, Clone)]
pub struct TimeoutSupervisor {
    reaper: Reaper,
    drain_grace: Duration,
}

impl TimeoutSupervisor {
    pub fn new(kill_grace: Duration) -> Self {
        Self {
            reaper: Reaper::new(kill_grace),
            drain_grace: kill_grace.max(MIN_DRAIN_GRACE),
        }
    }

    pub fn reaper(&self) -> &Reaper {
        &self.reaper
    }

    /// Wait for `process` to finish or for `deadline` to pass
    ///
    /// Once the process exits, its output streams get a short grace period
    /// to close. Descendants still holding them open after that are killed
    /// with the rest of the group, and the exit status is kept. On expiry
    /// the process group receives SIGTERM, the child is handed to the
    /// [`Reaper`], and a timed-out outcome carrying the output captured so
    /// far is returned without waiting.
    #[instrument(skip_all, fields(program = %process.program))]
    pub async fn with_deadline(&self, process: SpawnedProcess, deadline: Instant) -> ProcessOutcome {
        let SpawnedProcess {
            mut child,
            pid,
            stdout,
            stderr,
            mut streams,
            started,
            ..
        } = process;

        let result = tokio::time::timeout_at(deadline, child.wait()).await;

        if result.is_ok() {
            let drained = tokio::time::timeout(self.drain_grace, async {
                while streams.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                debug!(?pid, "output still open after exit, killing process group");
                if let Some(pid) = pid {
                    signal_group(pid, Signal::SIGKILL);
                }
                streams.abort_all();
            }
        }

        let (stdout, stdout_truncated) = stdout.snapshot();
        let (stderr, stderr_truncated) = stderr.snapshot();
        let mut outcome = ProcessOutcome {
            status: OutcomeStatus::Completed,
            stdout,
            stderr,
            exit_code: None,
            signal: None,
            truncated: stdout_truncated || stderr_truncated,
            elapsed: started.elapsed(),
            error: None,
        };

        match result {
            Ok(Ok(status)) => {
                outcome.exit_code = status.code();
                outcome.signal = status.signal();
                debug!(
                    exit_code = ?outcome.exit_code,
                    signal = ?outcome.signal,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "process finished"
                );
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to wait for process");
                outcome.error = Some(format!("failed to wait for process: {e}"));
            }
            Err(_) => {
                debug!(?pid, "deadline elapsed, terminating process group");
                outcome.status = OutcomeStatus::TimedOut;
                match pid {
                    Some(pid) => signal_group(pid, Signal::SIGTERM),
                    None => {
                        let _ = child.start_kill();
                    }
                }
                // Drain tasks are aborted when `streams` drops; what they
                // captured is already in the snapshot.
                self.reaper.reap(child, pid);
            }
        }

        outcome
    }
}
