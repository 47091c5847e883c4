//! A library for running untrusted snippets in ephemeral workspaces.
//!
//! Runcell turns a `(code, language, input, timeout)` request into one or
//! more child processes running inside a fresh per-request directory, and
//! reports what they printed and how they exited.
//!
//! # Features
//!
//! - **Per-request workspaces**: every execution gets its own directory,
//!   removed on every exit path.
//! - **Language strategies**: interpreted, compile-then-run and
//!   source-run languages, configured in TOML.
//! - **Deadlines**: one wall-clock budget covers all stages; timed-out
//!   process groups are terminated in the background.
//! - **Bounded output**: captured streams are capped and flagged when
//!   truncated.
//! - **Admission control**: an optional cap on concurrent executions.
//!
//! Runcell does no sandboxing beyond the workspace directory and the
//! deadline. Run it inside a container or VM when the code is untrusted.

pub use config::{Config, ConfigError, DEFAULT_CONFIG, Language, LanguageKind};
pub use language::{LanguageExecutor, PrepareError, Registry, RunPlan, Stage, StageKind};
pub use process::{ProcessRunner, Reaper, TimeoutSupervisor, normalize_input};
pub use runner::{ExecuteError, RequestError, Runner};
pub use toolchain::{ToolchainStatus, probe_all};
pub use types::{
    ExecutionReport, ExecutionRequest, OutcomeStatus, ProcessOutcome, RunStatus,
};
pub use uuid::Uuid;
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};

pub mod config;
pub mod language;
pub mod process;
pub mod runner;
pub mod toolchain;
pub mod types;
pub mod workspace;
