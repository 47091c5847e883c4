//! Integration tests for runcell
//!
//! These tests run real toolchains (python3, node, javac/java, npx tsx).
//! Run with: cargo test -p runcell --features toolchain-tests
//!
//! Tests that need a toolchain are marked `#[ignore]`. To include them:
//!    cargo test -p runcell --features toolchain-tests -- --include-ignored

#![cfg(feature = "toolchain-tests")]

use std::fs;
use std::path::Path;

use runcell::Runner;
use runcell::config::Config;
use tempfile::TempDir;

mod compilation;
mod compile_and_run;
mod config_loading;
mod execution;
mod workspace_lifecycle;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Default languages with workspaces under a private temp root
pub(crate) fn test_runner() -> (Runner, TempDir) {
    let root = TempDir::new().expect("Failed to create temp root");
    let mut config = Config::default();
    config.temp_root = root.path().to_path_buf();
    config.default_timeout_ms = 20_000;
    config.max_timeout_ms = 20_000;
    let runner = Runner::new(config).expect("Failed to build runner");
    (runner, root)
}

/// Entries left under a temp root
pub(crate) fn leftover_entries(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .map(|dir| {
            dir.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
