//! Workspace lifecycle management
//!
//! Manages the allocation, use, and removal of per-request directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::workspace::{WorkspaceError, is_plain_file_name};

/// An exclusively owned execution directory
///
/// # Cleanup
///
/// Always call [`release()`](Self::release) before dropping the workspace.
/// The `Drop` implementation removes the directory on a spawned thread as a
/// fallback for cancelled requests, but that removal is not awaited.
#[derive(Debug)]
pub struct Workspace {
    /// Execution id, also the directory name
    id: Uuid,

    /// Absolute path to the directory
    path: PathBuf,

    /// Whether the directory has been removed
    released: bool,

    /// Execution slot (if admission control is enabled)
    _permit: Option<OwnedSemaphorePermit>,
}

impl Workspace {
    /// Get the workspace id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path to a file inside the workspace
    ///
    /// Returns an error if the name is not a plain file name.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if !is_plain_file_name(name) {
            return Err(WorkspaceError::InvalidPath(format!(
                "not a plain file name: {name}"
            )));
        }
        Ok(self.path.join(name))
    }

    /// Write a file into the workspace
    #[instrument(skip(self, content), fields(workspace = %self.id))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), WorkspaceError> {
        let path = self.file_path(name)?;
        tokio::fs::write(&path, content).await?;
        debug!(?path, len = content.len(), "wrote file to workspace");
        Ok(())
    }

    /// Read a file from the workspace
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, WorkspaceError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Check if a file exists in the workspace
    pub async fn file_exists(&self, name: &str) -> Result<bool, WorkspaceError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Names of the entries currently in the workspace, sorted
    pub async fn file_names(&self) -> Result<Vec<String>, WorkspaceError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Recursively remove the workspace directory
    ///
    /// Removing an already-missing directory succeeds. Callers should log
    /// rather than propagate failures so that cleanup never changes a
    /// result that has already been computed.
    #[must_use = "cleanup errors should be logged"]
    #[instrument(skip(self), fields(workspace = %self.id))]
    pub async fn release(&mut self) -> Result<(), WorkspaceError> {
        if self.released {
            return Ok(());
        }

        // Mark first so a failed removal is not retried from Drop
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::RemoveFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Check if the workspace has been released
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            workspace = %self.id,
            path = %self.path.display(),
            "workspace dropped without release, removing on a background thread"
        );

        let path = self.path.clone();
        let id = self.id;
        std::thread::spawn(move || match std::fs::remove_dir_all(&path) {
            Ok(()) => debug!(workspace = %id, "best-effort removal succeeded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(workspace = %id, error = %e, "best-effort removal failed"),
        });
    }
}

/// Allocates workspaces under a temp root, optionally bounding how many may
/// exist at once
#[derive(Debug)]
pub struct WorkspaceManager {
    /// Directory holding all workspaces
    root: PathBuf,

    /// Execution slots (None = unbounded)
    slots: Option<Arc<Semaphore>>,

    /// Number of slots
    capacity: Option<usize>,

    /// How long to wait for a free slot
    queue_timeout: Duration,
}

impl WorkspaceManager {
    /// Create an unbounded manager rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: None,
            capacity: None,
            queue_timeout: Duration::ZERO,
        }
    }

    /// Bound the number of live workspaces; allocations wait up to
    /// `queue_timeout` for a slot
    pub fn with_capacity(mut self, capacity: usize, queue_timeout: Duration) -> Self {
        self.slots = Some(Arc::new(Semaphore::new(capacity)));
        self.capacity = Some(capacity);
        self.queue_timeout = queue_timeout;
        self
    }

    /// Create a manager from the temp root and admission settings in `config`
    pub fn from_config(config: &Config) -> Self {
        let manager = Self::new(&config.temp_root);
        match config.max_concurrent {
            Some(capacity) => manager.with_capacity(capacity, config.queue_timeout()),
            None => manager,
        }
    }

    /// Get the temp root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the temp root if it is missing
    pub async fn prepare_root(&self) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::CreateFailed {
                path: self.root.clone(),
                source,
            })
    }

    /// Allocate a workspace with a fresh id
    pub async fn allocate(&self) -> Result<Workspace, WorkspaceError> {
        self.allocate_for(Uuid::new_v4()).await
    }

    /// Allocate the workspace for an execution id
    #[instrument(skip(self))]
    pub async fn allocate_for(&self, id: Uuid) -> Result<Workspace, WorkspaceError> {
        let permit = self.acquire_slot().await?;

        self.prepare_root().await?;

        // create_dir (not create_dir_all) so an existing directory is never shared
        let path = self.root.join(id.to_string());
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| WorkspaceError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        debug!(?path, "workspace allocated");

        Ok(Workspace {
            id,
            path,
            released: false,
            _permit: permit,
        })
    }

    async fn acquire_slot(&self) -> Result<Option<OwnedSemaphorePermit>, WorkspaceError> {
        let (Some(slots), Some(capacity)) = (&self.slots, self.capacity) else {
            return Ok(None);
        };

        let started = Instant::now();
        match tokio::time::timeout(self.queue_timeout, slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(Some(permit)),
            Ok(Err(_)) | Err(_) => {
                let waited = started.elapsed();
                warn!(capacity, ?waited, "no execution slot available");
                Err(WorkspaceError::Busy { capacity, waited })
            }
        }
    }

    /// Get the number of free slots (None when unbounded)
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Get the number of slots (None when unbounded)
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
