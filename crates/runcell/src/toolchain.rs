//! Toolchain availability probe
//!
//! Runs each language's `version_command` once at startup. A missing
//! toolchain is reported, never fatal.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{Config, Language};
use crate::process::extended_path;

/// Default time allowed for a single version command
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing one language's toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainStatus {
    pub language: String,
    pub available: bool,

    /// First line the version command printed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolchainStatus {
    fn unavailable(language: &str, error: String) -> Self {
        Self {
            language: language.to_owned(),
            available: false,
            version: None,
            error: Some(error),
        }
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
}

/// Run the version command of `language`
///
/// Returns `None` if the language declares no version command.
pub async fn probe(id: &str, language: &Language, timeout: Duration) -> Option<ToolchainStatus> {
    let command = language.version_command.as_ref()?;
    let Some((program, args)) = command.split_first() else {
        return Some(ToolchainStatus::unavailable(id, "empty version command".into()));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in &language.env {
        cmd.env(&var.name, &var.value);
    }
    if !language.extra_path.is_empty() {
        match extended_path(&language.extra_path) {
            Ok(path) => {
                cmd.env("PATH", path);
            }
            Err(e) => return Some(ToolchainStatus::unavailable(id, e.to_string())),
        }
    }

    let status = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => ToolchainStatus::unavailable(
            id,
            format!("'{program}' did not answer within {} ms", timeout.as_millis()),
        ),
        Ok(Err(e)) => ToolchainStatus::unavailable(id, format!("failed to start '{program}': {e}")),
        Ok(Ok(output)) if !output.status.success() => {
            let detail = first_line(&output.stderr).unwrap_or_else(|| output.status.to_string());
            ToolchainStatus::unavailable(id, format!("'{program}' failed: {detail}"))
        }
        Ok(Ok(output)) => ToolchainStatus {
            language: id.to_owned(),
            available: true,
            // `java -version` prints to stderr
            version: first_line(&output.stdout).or_else(|| first_line(&output.stderr)),
            error: None,
        },
    };
    Some(status)
}

/// Probe every configured language concurrently, logging each result
///
/// Results are sorted by language id.
pub async fn probe_all(config: &Config, timeout: Duration) -> Vec<ToolchainStatus> {
    let mut probes = JoinSet::new();
    for (id, language) in &config.languages {
        let id = id.clone();
        let language = language.clone();
        probes.spawn(async move { probe(&id, &language, timeout).await });
    }

    let mut results = Vec::new();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(Some(status)) => results.push(status),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "toolchain probe task failed"),
        }
    }
    results.sort_by(|a, b| a.language.cmp(&b.language));

    for status in &results {
        if status.available {
            info!(
                language = %status.language,
                version = status.version.as_deref().unwrap_or("unknown"),
                "toolchain available"
            );
        } else {
            warn!(
                language = %status.language,
                error = status.error.as_deref().unwrap_or_default(),
                "toolchain unavailable"
            );
        }
    }
    results
}
