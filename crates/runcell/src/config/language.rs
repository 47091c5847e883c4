use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default entry class for compiled languages when the source names none
pub const DEFAULT_ENTRY_CLASS: &str = "Main";

/// How a language turns a submission into processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    /// Source is written to a fixed file and handed to an interpreter
    Interpreted,

    /// A compile stage followed by a run stage. The source file is named
    /// after the public class it declares (JVM convention).
    Compiled,

    /// Source is executed directly by a source-aware runner, next to a
    /// project descriptor that relaxes type checking
    SourceRun,
}

impl LanguageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageKind::Interpreted => "interpreted",
            LanguageKind::Compiled => "compiled",
            LanguageKind::SourceRun => "source_run",
        }
    }
}

impl std::fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "Java")
    pub name: String,

    /// Runtime label reported with every result (e.g., "Java OpenJDK 11")
    pub version: String,

    /// Short description shown by the languages endpoint
    #[serde(default)]
    pub description: String,

    /// Execution strategy
    pub kind: LanguageKind,

    /// File the submission is written to. Compiled languages may use the
    /// `{class}` placeholder (e.g., "{class}.java").
    pub source_name: String,

    /// Compilation configuration (required for compiled languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,

    /// Extra environment variables for every stage (e.g., JAVA_HOME)
    #[serde(default)]
    pub env: Vec<EnvVar>,

    /// Directories appended to the inherited PATH
    #[serde(default)]
    pub extra_path: Vec<PathBuf>,

    /// Command printing the toolchain version, used by the startup probe
    #[serde(default)]
    pub version_command: Option<Vec<String>>,

    /// Project descriptor written next to the source (source_run only)
    #[serde(default)]
    pub project_file: Option<ProjectFile>,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Get the source file name for the given entry class
    pub fn source_name_for(&self, class: &str) -> String {
        self.source_name.replace("{class}", class)
    }

    /// Runtime label for a submission that failed to compile
    pub fn compile_failed_label(&self) -> String {
        format!("{} (Compilation Failed)", self.version)
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], placeholders: &Placeholders<'_>) -> Vec<String> {
        command
            .iter()
            .map(|arg| {
                arg.replace("{source}", placeholders.source)
                    .replace("{class}", placeholders.class)
                    .replace("{workspace}", placeholders.workspace)
            })
            .collect()
    }
}

/// Values substituted into configured commands
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    /// `{source}`: source file name, relative to the workspace
    pub source: &'a str,
    /// `{class}`: entry class name (compiled languages)
    pub class: &'a str,
    /// `{workspace}`: absolute workspace directory
    pub workspace: &'a str,
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {class}, {workspace}
    pub command: Vec<String>,

    /// Class used when the source declares no public class
    #[serde(default = "default_entry_class")]
    pub default_class: String,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {class}, {workspace}
    pub command: Vec<String>,
}

/// A single environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Auxiliary file written into the workspace before running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    pub contents: String,
}

fn default_entry_class() -> String {
    DEFAULT_ENTRY_CLASS.to_owned()
}
