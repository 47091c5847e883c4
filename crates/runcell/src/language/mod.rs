//! Language executor registry
//!
//! Maps language identifiers to strategies that turn a submission into
//! files and process stages. The registry is built once from the
//! configuration and never mutated, so it is shared without locking.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use crate::language::class_name::{entry_class, public_classes};
pub use crate::language::strategy::{Compiled, Interpreted, SourceRun};

mod class_name;
mod strategy;

use crate::config::{Config, ConfigError, EnvVar, Language, LanguageKind};
use crate::workspace::{Workspace, WorkspaceError};

/// Errors raised while turning a submission into a run plan
///
/// These describe the submitted program, not the service.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(
        "found {} top-level public classes ({}); declare exactly one public class",
        .0.len(),
        .0.join(", ")
    )]
    AmbiguousClass(Vec<String>),

    #[error("invalid entry class name '{0}'")]
    InvalidClassName(String),
}

/// Role of a stage within a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Compile,
    Run,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Compile => "compile",
            StageKind::Run => "run",
        }
    }
}

/// One process to spawn inside the workspace
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,

    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Working directory (the workspace)
    pub working_dir: PathBuf,

    /// Variables added to the inherited environment
    pub env: Vec<EnvVar>,

    /// Directories appended to the inherited PATH
    pub extra_path: Vec<PathBuf>,

    /// Whether the request input is piped to this stage
    pub pipes_input: bool,
}

impl Stage {
    /// Program to execute
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the program
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

/// A file to create in the workspace before any stage runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

/// Ordered stages plus the files they need
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub files: Vec<SourceFile>,
    pub stages: Vec<Stage>,
}

impl RunPlan {
    /// Write the plan's files into the workspace
    pub async fn materialize(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        for file in &self.files {
            workspace
                .write_file(&file.name, file.contents.as_bytes())
                .await?;
        }
        Ok(())
    }

    /// Name of the source file holding the submission
    pub fn source_name(&self) -> Option<&str> {
        self.files.last().map(|f| f.name.as_str())
    }

    /// Whether the plan compiles before running
    pub fn has_compile_stage(&self) -> bool {
        self.stages.iter().any(|s| s.kind == StageKind::Compile)
    }
}

/// A language-specific policy for turning source text into stages
pub trait LanguageExecutor: std::fmt::Debug + Send + Sync {
    /// Language configuration the executor was built from
    fn language(&self) -> &Language;

    /// Build the plan for `code` running inside `workspace`
    ///
    /// Does no I/O; the files are written by [`RunPlan::materialize`].
    fn prepare(&self, code: &str, workspace: &Path) -> Result<RunPlan, PrepareError>;
}

/// Immutable lookup table from language id to executor
#[derive(Debug, Default)]
pub struct Registry {
    executors: BTreeMap<String, Box<dyn LanguageExecutor>>,
}

impl Registry {
    /// Build executors for every configured language
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut executors: BTreeMap<String, Box<dyn LanguageExecutor>> = BTreeMap::new();
        for (id, language) in &config.languages {
            let executor: Box<dyn LanguageExecutor> = match language.kind {
                LanguageKind::Interpreted => Box::new(Interpreted::new(language.clone())),
                LanguageKind::SourceRun => Box::new(SourceRun::new(language.clone())),
                LanguageKind::Compiled => Box::new(Compiled::new(language.clone()).ok_or_else(
                    || {
                        ConfigError::Invalid(format!(
                            "compiled language '{id}' has no compile section"
                        ))
                    },
                )?),
            };
            executors.insert(id.clone(), executor);
        }
        Ok(Self { executors })
    }

    /// Look up an executor by language id
    pub fn get(&self, id: &str) -> Option<&dyn LanguageExecutor> {
        self.executors.get(id).map(|e| e.as_ref())
    }

    /// Sorted language ids
    pub fn ids(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }

    /// Iterate over executors in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn LanguageExecutor)> {
        self.executors
            .iter()
            .map(|(id, e)| (id.as_str(), e.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
