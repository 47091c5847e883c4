use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to run one submission
///
/// Immutable once accepted by the runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Source text
    #[serde(default)]
    pub code: String,

    /// Registered language identifier
    #[serde(default)]
    pub language: String,

    /// Text fed to the program's standard input
    #[serde(default)]
    pub input: Option<String>,

    /// Requested timeout in milliseconds (clamped to the server ceiling)
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            input: None,
            timeout_ms: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Classification of a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    /// The process ran and exited on its own
    Completed,

    /// The deadline elapsed before the process finished
    TimedOut,

    /// The process could not be started
    SpawnFailed,
}

/// What a single process stage produced
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: OutcomeStatus,

    /// Captured standard output (lossy UTF-8)
    pub stdout: String,

    /// Captured standard error (lossy UTF-8)
    pub stderr: String,

    /// Exit code, absent if the process never started, timed out, or was
    /// killed by a signal
    pub exit_code: Option<i32>,

    /// Terminating signal, if any
    pub signal: Option<i32>,

    /// Whether either stream hit the capture limit
    pub truncated: bool,

    /// Wall time spent in this stage
    pub elapsed: Duration,

    /// System error text for spawn failures
    pub error: Option<String>,
}

impl ProcessOutcome {
    /// Outcome for a process that could not be started
    pub fn spawn_failed(program: &str, error: &std::io::Error) -> Self {
        let message = format!("failed to start '{program}': {error}");
        Self {
            status: OutcomeStatus::SpawnFailed,
            stdout: String::new(),
            stderr: message.clone(),
            exit_code: None,
            signal: None,
            truncated: false,
            elapsed: Duration::ZERO,
            error: Some(message),
        }
    }

    /// Outcome for a stage whose budget was spent before it could start
    pub fn out_of_time() -> Self {
        Self {
            status: OutcomeStatus::TimedOut,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            signal: None,
            truncated: false,
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// Check if the process exited with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Completed && self.exit_code == Some(0)
    }
}

/// Final classification of an execution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// The program ran to completion (any exit code)
    Completed,

    /// The compile stage exited non-zero; the run stage was skipped
    CompilationFailed,

    /// The time budget elapsed
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompilationFailed => "compilationFailed",
            RunStatus::TimedOut => "timedOut",
        }
    }
}

/// Result of an execution request
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Identifier shared by the workspace and the log records
    pub execution_id: Uuid,

    /// Echoed language identifier
    pub language: String,

    pub status: RunStatus,

    /// Program standard output, empty if nothing was produced
    pub stdout: String,

    /// Program (or compiler) standard error, empty if nothing was produced
    pub stderr: String,

    pub exit_code: Option<i32>,

    pub signal: Option<i32>,

    /// Runtime/version label of the language
    pub runtime: String,

    /// Whether any captured stream was truncated
    pub truncated: bool,

    /// Wall time of the whole request
    pub duration: Duration,

    /// Timeout the request ran under
    pub timeout: Duration,
}

impl ExecutionReport {
    /// Whether the service produced a result for the program.
    ///
    /// Compilation failures and non-zero exits are properties of the
    /// submitted program and still count as success; only a timeout does not.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status != RunStatus::TimedOut
    }

    pub fn timed_out(&self) -> bool {
        self.status == RunStatus::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: RunStatus, exit_code: Option<i32>) -> ExecutionReport {
        ExecutionReport {
            execution_id: Uuid::new_v4(),
            language: "python".to_owned(),
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code,
            signal: None,
            runtime: "Python 3.11".to_owned(),
            truncated: false,
            duration: Duration::from_millis(5),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn request_builder() {
        let request = ExecutionRequest::new("python", "print(1)")
            .with_input("3 4")
            .with_timeout_ms(200);
        assert_eq!(request.language, "python");
        assert_eq!(request.input.as_deref(), Some("3 4"));
        assert_eq!(request.timeout_ms, Some(200));
    }

    #[test]
    fn spawn_failed_outcome_carries_error_text() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file");
        let outcome = ProcessOutcome::spawn_failed("javac", &err);
        assert_eq!(outcome.status, OutcomeStatus::SpawnFailed);
        assert!(outcome.exit_code.is_none());
        assert!(outcome.stderr.contains("javac"));
        assert!(outcome.error.unwrap().contains("No such file"));
        assert!(outcome.stdout.is_empty());
    }

    #[test]
    fn outcome_success_requires_zero_exit() {
        let mut outcome = ProcessOutcome::out_of_time();
        assert!(!outcome.is_success());
        outcome.status = OutcomeStatus::Completed;
        outcome.exit_code = Some(1);
        assert!(!outcome.is_success());
        outcome.exit_code = Some(0);
        assert!(outcome.is_success());
    }

    #[test]
    fn report_success_for_program_failures() {
        assert!(report(RunStatus::Completed, Some(1)).is_success());
        assert!(report(RunStatus::CompilationFailed, Some(1)).is_success());
    }

    #[test]
    fn report_failure_only_for_timeout() {
        let timed_out = report(RunStatus::TimedOut, None);
        assert!(!timed_out.is_success());
        assert!(timed_out.timed_out());
    }

    #[test]
    fn run_status_labels() {
        assert_eq!(RunStatus::Completed.as_str(), "completed");
        assert_eq!(RunStatus::CompilationFailed.as_str(), "compilationFailed");
        assert_eq!(RunStatus::TimedOut.as_str(), "timedOut");
    }
}
