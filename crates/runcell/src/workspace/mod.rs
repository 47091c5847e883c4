//! Per-request workspaces
//!
//! Every execution gets a fresh directory under the configured temp root,
//! named after its execution id. The directory is owned by exactly one
//! request and removed when the request ends, whatever the outcome.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use crate::workspace::manager::{Workspace, WorkspaceManager};

mod manager;

/// Errors that occur while allocating or using a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace at {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace at {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("all {capacity} execution slots are busy (waited {waited:?})")]
    Busy { capacity: usize, waited: Duration },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check that `name` is a single relative path component
///
/// Rejects empty names, separators and traversal.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
