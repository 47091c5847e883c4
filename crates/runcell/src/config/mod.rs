use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, DEFAULT_ENTRY_CLASS, EnvVar, Language, LanguageKind, Placeholders,
    ProjectFile, RunConfig,
};

pub mod language;
mod loader;

/// Default configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const DEFAULT_CONFIG: &str = include_str!("../../runcell.default.toml");

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "RUNCELL";

/// Largest accepted `max_timeout_ms` (one day)
pub const TIMEOUT_CEILING_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for Runcell
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory under which per-request workspaces are created
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    /// Timeout applied when a request does not specify one (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Ceiling for requested timeouts (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Per-stream cap on captured output, in bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Maximum number of concurrently running executions (unbounded if unset)
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// How long a request waits for an execution slot (milliseconds)
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    /// Delay between SIGTERM and SIGKILL for timed out programs (milliseconds)
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Maximum accepted request body size, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: BTreeMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            temp_root: default_temp_root(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
            max_concurrent: None,
            queue_timeout_ms: default_queue_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            max_body_bytes: default_max_body_bytes(),
            languages: BTreeMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Sorted IDs of all configured languages
    pub fn language_ids(&self) -> Vec<String> {
        self.languages.keys().cloned().collect()
    }

    /// Resolve the timeout for a request: the requested value (or the
    /// default) clamped to the server-wide ceiling.
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.default_timeout_ms)
            .clamp(1, self.max_timeout_ms.max(1));
        Duration::from_millis(ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Socket address string for the HTTP listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(DEFAULT_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    3001
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("runcell")
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_queue_timeout_ms() -> u64 {
    5_000
}

fn default_kill_grace_ms() -> u64 {
    200
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
