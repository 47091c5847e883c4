//! Request pipeline
//!
//! [`Runner`] validates a request, allocates a workspace, asks the language
//! executor for a plan, runs the plan under the request deadline and always
//! releases the workspace before returning.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

pub use crate::runner::compile::{CompileResult, compile};
pub use crate::runner::execute::{PlanOutcome, execute};

mod compile;
mod execute;

use crate::config::{Config, ConfigError, TIMEOUT_CEILING_MS};
use crate::language::{LanguageExecutor, PrepareError, Registry};
use crate::process::{ProcessRunner, normalize_input};
use crate::types::{ExecutionReport, ExecutionRequest, OutcomeStatus, RunStatus};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceManager};

/// Errors in the request itself, detected before anything runs
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Code is required")]
    MissingCode,

    #[error("Language is required")]
    MissingLanguage,

    #[error("Unsupported language: {language}")]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },
}

/// Errors that occur while executing a request
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{source}")]
    Workspace {
        execution_id: Uuid,
        #[source]
        source: WorkspaceError,
    },

    #[error("{source}")]
    Prepare {
        execution_id: Uuid,
        #[source]
        source: PrepareError,
    },

    /// A stage's program could not be started
    #[error("{message}")]
    Spawn {
        execution_id: Uuid,
        message: String,
        stderr: String,
    },
}

impl ExecuteError {
    /// Execution id, if one had been assigned
    pub fn execution_id(&self) -> Option<Uuid> {
        match self {
            ExecuteError::Request(_) => None,
            ExecuteError::Workspace { execution_id, .. }
            | ExecuteError::Prepare { execution_id, .. }
            | ExecuteError::Spawn { execution_id, .. } => Some(*execution_id),
        }
    }

    /// Whether the request was turned away for lack of an execution slot
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ExecuteError::Workspace {
                source: WorkspaceError::Busy { .. },
                ..
            }
        )
    }

    /// Whether the submission, not the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, ExecuteError::Request(_) | ExecuteError::Prepare { .. })
    }

    /// Standard error to report alongside the failure
    pub fn stderr(&self) -> String {
        match self {
            ExecuteError::Spawn { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// High-level runner for code execution
///
/// Cheap to clone; all clones share the configuration, registry, workspace
/// slots and reaper.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    registry: Arc<Registry>,
    workspaces: Arc<WorkspaceManager>,
    processes: ProcessRunner,
}

impl Runner {
    /// Create a runner, building executors for every configured language
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::from_arc(Arc::new(config))
    }

    pub fn from_arc(config: Arc<Config>) -> Result<Self, ConfigError> {
        let registry = Registry::from_config(&config)?;
        Ok(Self {
            registry: Arc::new(registry),
            workspaces: Arc::new(WorkspaceManager::from_config(&config)),
            processes: ProcessRunner::from_config(&config),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Sorted ids of the supported languages
    pub fn supported_languages(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Check a request and resolve its executor
    pub fn validate(&self, request: &ExecutionRequest) -> Result<&dyn LanguageExecutor, RequestError> {
        if request.code.trim().is_empty() {
            return Err(RequestError::MissingCode);
        }
        if request.language.trim().is_empty() {
            return Err(RequestError::MissingLanguage);
        }
        self.registry
            .get(&request.language)
            .ok_or_else(|| RequestError::UnsupportedLanguage {
                language: request.language.clone(),
                supported: self.registry.ids(),
            })
    }

    /// Execute a request end to end
    ///
    /// Program behaviour (non-zero exit, compile failure, timeout) is part of
    /// the returned report. Errors are reserved for invalid requests and
    /// failures of the service itself. The workspace is removed on every
    /// path, including cancellation of the returned future.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ExecuteError> {
        let started = Instant::now();
        let executor = self.validate(&request)?;
        let execution_id = Uuid::new_v4();
        let timeout = self.config.effective_timeout(request.timeout_ms);

        let span = info_span!(
            "execute",
            %execution_id,
            language = %request.language,
            timeout_ms = timeout.as_millis() as u64,
        );

        async move {
            let mut workspace = self
                .workspaces
                .allocate_for(execution_id)
                .await
                .map_err(|source| ExecuteError::Workspace {
                    execution_id,
                    source,
                })?;
            debug!(path = %workspace.path().display(), "workspace ready");

            let result = self
                .run_in(&workspace, executor, &request, timeout)
                .await;

            if let Err(e) = workspace.release().await {
                warn!(error = %e, "failed to remove workspace");
            }

            let mut report = result?;
            report.duration = started.elapsed();
            info!(
                status = report.status.as_str(),
                exit_code = ?report.exit_code,
                elapsed_ms = report.duration.as_millis() as u64,
                "execution finished"
            );
            Ok::<_, ExecuteError>(report)
        }
        .instrument(span)
        .await
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        executor: &dyn LanguageExecutor,
        request: &ExecutionRequest,
        timeout: Duration,
    ) -> Result<ExecutionReport, ExecuteError> {
        let execution_id = workspace.id();
        let language = executor.language();

        let plan = executor
            .prepare(&request.code, workspace.path())
            .map_err(|source| ExecuteError::Prepare {
                execution_id,
                source,
            })?;
        plan.materialize(workspace)
            .await
            .map_err(|source| ExecuteError::Workspace {
                execution_id,
                source,
            })?;

        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or(now + Duration::from_millis(TIMEOUT_CEILING_MS));
        let input = normalize_input(request.input.as_deref());

        let mut report = ExecutionReport {
            execution_id,
            language: request.language.clone(),
            status: RunStatus::Completed,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            signal: None,
            runtime: language.version.clone(),
            truncated: false,
            duration: Duration::ZERO,
            timeout,
        };

        match execute(&self.processes, &plan, input, deadline).await {
            PlanOutcome::CompileFailed(result) => {
                report.status = RunStatus::CompilationFailed;
                report.stderr = result.diagnostics(language);
                report.exit_code = result.outcome.exit_code;
                report.signal = result.outcome.signal;
                report.truncated = result.outcome.truncated;
                report.runtime = language.compile_failed_label();
            }
            PlanOutcome::Finished(outcome) => {
                if outcome.status == OutcomeStatus::SpawnFailed {
                    let message = outcome
                        .error
                        .unwrap_or_else(|| "failed to start process".to_owned());
                    error!(error = %message, "stage could not be started");
                    return Err(ExecuteError::Spawn {
                        execution_id,
                        message,
                        stderr: outcome.stderr,
                    });
                }
                if outcome.status == OutcomeStatus::TimedOut {
                    report.status = RunStatus::TimedOut;
                }
                report.stdout = outcome.stdout;
                report.stderr = outcome.stderr;
                report.exit_code = outcome.exit_code;
                report.signal = outcome.signal;
                report.truncated = outcome.truncated;
            }
        }

        Ok(report)
    }

    /// Wait for timed-out processes to be terminated
    ///
    /// Returns `false` if some were still pending after `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let reaper = self.processes.supervisor().reaper();
        let pending = reaper.pending();
        if pending > 0 {
            info!(pending, "waiting for terminated processes");
        }
        reaper.shutdown(grace).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn test_config(root: &Path, extra: &str) -> Config {
        Config::parse_toml(&format!(
            r#"
temp_root = "{root}"
default_timeout_ms = 5000
max_timeout_ms = 5000
kill_grace_ms = 100
{extra}

[languages.shell]
name = "Shell"
version = "POSIX sh"
kind = "interpreted"
source_name = "script.sh"

[languages.shell.run]
command = ["sh", "{{source}}"]

[languages.shellc]
name = "ShellC"
version = "sh -n checked"
kind = "compiled"
source_name = "{{class}}.sh"

[languages.shellc.compile]
command = ["sh", "-n", "{{source}}"]

[languages.shellc.run]
command = ["sh", "{{workspace}}/{{class}}.sh"]

[languages.shellp]
name = "ShellP"
version = "sh with project"
kind = "source_run"
source_name = "main.sh"

[languages.shellp.run]
command = ["sh", "{{source}}"]

[languages.shellp.project_file]
name = "project.txt"
contents = "project settings"

[languages.missing]
name = "Missing"
version = "none"
kind = "interpreted"
source_name = "prog"

[languages.missing.run]
command = ["runcell-no-such-binary", "{{source}}"]
"#,
            root = root.display(),
        ))
        .unwrap()
    }

    fn runner(root: &Path) -> Runner {
        Runner::new(test_config(root, "")).unwrap()
    }

    fn entries(root: &Path) -> Vec<String> {
        match std::fs::read_dir(root) {
            Ok(dir) => dir
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn runs_program_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());

        let report = runner
            .execute(ExecutionRequest::new("shell", "echo hi"))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.stdout, "hi\n");
        assert_eq!(report.stderr, "");
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.runtime, "POSIX sh");
        assert_eq!(report.language, "shell");
        assert!(report.is_success());
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn single_line_input_is_split() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(
                ExecutionRequest::new("shell", "read a\nread b\necho $((a + b))")
                    .with_input("3 4"),
            )
            .await
            .unwrap();
        assert_eq!(report.stdout, "7\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_failed() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(ExecutionRequest::new("shell", "echo bad >&2; exit 3"))
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.exit_code, Some(3));
        assert_eq!(report.stderr, "bad\n");
    }

    #[tokio::test]
    async fn validation_errors() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());

        let err = runner
            .execute(ExecutionRequest::new("shell", "   \n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Request(RequestError::MissingCode)));
        assert!(err.is_client_error());
        assert!(err.execution_id().is_none());

        let err = runner
            .execute(ExecutionRequest::new("", "echo hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Request(RequestError::MissingLanguage)));

        let err = runner
            .execute(ExecutionRequest::new("cobol", "echo hi"))
            .await
            .unwrap_err();
        match err {
            ExecuteError::Request(RequestError::UnsupportedLanguage { language, supported }) => {
                assert_eq!(language, "cobol");
                assert_eq!(supported, vec!["missing", "shell", "shellc", "shellp"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn compiled_language_compiles_then_runs() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(ExecutionRequest::new("shellc", "echo compiled; ls").with_input("x"))
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.stdout, "compiled\nMain.sh\n");
        assert_eq!(report.runtime, "sh -n checked");
    }

    #[tokio::test]
    async fn compile_failure_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(ExecutionRequest::new("shellc", "if then fi (("))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::CompilationFailed);
        assert!(report.is_success());
        assert!(report.stdout.is_empty());
        assert!(report.stderr.starts_with("ShellC Compilation Error:\n"));
        assert!(matches!(report.exit_code, Some(code) if code != 0));
        assert_eq!(report.runtime, "sh -n checked (Compilation Failed)");
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn ambiguous_entry_class_is_client_error() {
        let root = tempfile::tempdir().unwrap();
        let err = runner(root.path())
            .execute(ExecutionRequest::new(
                "shellc",
                "public class A {}\npublic class B {}",
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Prepare {
                source: PrepareError::AmbiguousClass(_),
                ..
            }
        ));
        assert!(err.is_client_error());
        assert!(err.execution_id().is_some());
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn source_run_writes_project_file() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(ExecutionRequest::new("shellp", "cat project.txt"))
            .await
            .unwrap();
        assert_eq!(report.stdout, "project settings");
    }

    #[tokio::test]
    async fn timeout_returns_promptly_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());
        let started = std::time::Instant::now();

        let report = runner
            .execute(ExecutionRequest::new("shell", "echo partial\nsleep 30").with_timeout_ms(200))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::TimedOut);
        assert!(!report.is_success());
        assert!(report.exit_code.is_none());
        assert_eq!(report.timeout, Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(entries(root.path()).is_empty());
        assert!(runner.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn requested_timeout_is_clamped() {
        let root = tempfile::tempdir().unwrap();
        let report = runner(root.path())
            .execute(ExecutionRequest::new("shell", "true").with_timeout_ms(10_000_000))
            .await
            .unwrap();
        assert_eq!(report.timeout, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn unbounded_timeout_does_not_overflow_deadline() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path(), "");
        config.max_timeout_ms = u64::MAX;
        let report = Runner::new(config)
            .unwrap()
            .execute(ExecutionRequest::new("shell", "echo hi").with_timeout_ms(u64::MAX))
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.stdout, "hi\n");
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = runner(root.path())
            .execute(ExecutionRequest::new("missing", "anything"))
            .await
            .unwrap_err();

        match &err {
            ExecuteError::Spawn { message, .. } => {
                assert!(message.contains("runcell-no-such-binary"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_client_error());
        assert!(err.execution_id().is_some());
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());

        let mut tasks = Vec::new();
        for i in 0..10 {
            let runner = runner.clone();
            tasks.push(tokio::spawn(async move {
                let code = format!("echo {i} > mine.txt\nsleep 0.1\nls | wc -l\ncat mine.txt");
                (i, runner.execute(ExecutionRequest::new("shell", code)).await)
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            let (i, result) = task.await.unwrap();
            let report = result.unwrap();
            let lines: Vec<_> = report.stdout.lines().map(str::trim).collect();
            assert_eq!(lines, vec!["2".to_owned(), i.to_string()]);
            assert!(ids.insert(report.execution_id));
        }
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn busy_when_slots_exhausted() {
        let root = tempfile::tempdir().unwrap();
        let runner = Runner::new(test_config(
            root.path(),
            "max_concurrent = 1\nqueue_timeout_ms = 50",
        ))
        .unwrap();

        let slow = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .execute(ExecutionRequest::new("shell", "sleep 1"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = runner
            .execute(ExecutionRequest::new("shell", "echo hi"))
            .await
            .unwrap_err();
        assert!(err.is_busy());
        assert!(!err.is_client_error());

        assert!(slow.await.unwrap().is_ok());
        assert!(runner.execute(ExecutionRequest::new("shell", "true")).await.is_ok());
    }

    #[test]
    fn default_config_builds_runner() {
        let runner = Runner::new(Config::default()).unwrap();
        assert_eq!(
            runner.supported_languages(),
            vec!["java", "javascript", "python", "typescript"]
        );
    }
}
