//! Compile stage handling

use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::config::Language;
use crate::language::Stage;
use crate::process::ProcessRunner;
use crate::types::{OutcomeStatus, ProcessOutcome};

/// Result of a compile stage
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Outcome of the compiler process
    pub outcome: ProcessOutcome,
}

impl CompileResult {
    /// Whether the compiler ran and exited with code 0
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Whether the compiler itself ran and rejected the program
    ///
    /// Timeouts and spawn failures are not compile failures.
    pub fn is_rejection(&self) -> bool {
        self.outcome.status == OutcomeStatus::Completed && self.outcome.exit_code != Some(0)
    }

    /// Compiler diagnostics, prefixed with the language name
    pub fn diagnostics(&self, language: &Language) -> String {
        format!("{} Compilation Error:\n{}", language.name, self.outcome.stderr)
    }
}

/// Run a compile stage; it never receives the request input
#[instrument(skip(processes, stage), fields(command = ?stage.command))]
pub async fn compile(processes: &ProcessRunner, stage: &Stage, deadline: Instant) -> CompileResult {
    let outcome = processes.run(stage, None, deadline).await;
    debug!(
        status = ?outcome.status,
        exit_code = ?outcome.exit_code,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "compile stage finished"
    );
    CompileResult { outcome }
}
