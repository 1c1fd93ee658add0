//! Scoped working files.
//!
//! Every conversion request gets a [`TempScope`]. Paths handed out by a scope
//! live in one shared working directory, are uniquely named
//! (`{prefix}_{unix_millis}_{random}.{ext}`), and are removed when the scope is
//! released or dropped. Removal is best-effort: failures are logged and counted
//! but never surface to the caller.

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::TEMP_CLEANUP_FAILURES;

/// Working directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory for intermediate files, created on demand.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// File name prefix for every working file.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
}

fn default_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_prefix() -> String {
    "stickerline".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            file_prefix: default_prefix(),
        }
    }
}

/// Shared working directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    dir: PathBuf,
    prefix: String,
}

impl TempWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: default_prefix(),
        }
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            prefix: config.file_prefix.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Opens a scope owned by one request.
    pub fn scope(&self, request_id: impl Into<String>) -> TempScope {
        TempScope {
            request_id: request_id.into(),
            dir: self.dir.clone(),
            prefix: self.prefix.clone(),
            files: Mutex::new(Vec::new()),
        }
    }
}

/// A path registered under a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    path: PathBuf,
    scope: String,
}

impl TempFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Result of releasing a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub removed: usize,
    pub failed: usize,
}

/// Lifetime boundary for all working files of one request.
#[derive(Debug)]
pub struct TempScope {
    request_id: String,
    dir: PathBuf,
    prefix: String,
    files: Mutex<Vec<PathBuf>>,
}

impl TempScope {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Reserves a unique path. The directory is created if missing.
    pub async fn acquire(&self, extension: &str) -> io::Result<TempFile> {
        // create_dir_all succeeds when another request created it first
        tokio::fs::create_dir_all(&self.dir).await?;

        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}.{}",
            self.prefix,
            Utc::now().timestamp_millis(),
            &suffix[..8],
            extension
        );
        let path = self.dir.join(name);

        self.lock_files().push(path.clone());
        debug!(scope = %self.request_id, path = %path.display(), "Acquired temp file");

        Ok(TempFile {
            path,
            scope: self.request_id.clone(),
        })
    }

    /// Reserves a path and writes `bytes` to it.
    pub async fn write(&self, extension: &str, bytes: &[u8]) -> io::Result<TempFile> {
        let file = self.acquire(extension).await?;
        tokio::fs::write(file.path(), bytes).await?;
        Ok(file)
    }

    /// Number of paths currently registered.
    pub fn len(&self) -> usize {
        self.lock_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registered file. Never fails.
    pub async fn release(&self) -> ReleaseReport {
        let files = std::mem::take(&mut *self.lock_files());
        if files.is_empty() {
            return ReleaseReport::default();
        }

        let results = join_all(files.iter().map(|path| tokio::fs::remove_file(path))).await;

        let mut report = ReleaseReport::default();
        for (path, result) in files.iter().zip(results) {
            match result {
                Ok(()) => report.removed += 1,
                // Reserved but never written
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    report.failed += 1;
                    TEMP_CLEANUP_FAILURES.inc();
                    warn!(
                        scope = %self.request_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove temp file"
                    );
                }
            }
        }

        debug!(
            scope = %self.request_id,
            removed = report.removed,
            failed = report.failed,
            "Released temp scope"
        );
        report
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        // A poisoned list is still a list of paths to clean up
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        let files = std::mem::take(&mut *self.lock_files());
        for path in files {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    TEMP_CLEANUP_FAILURES.inc();
                    warn!(
                        scope = %self.request_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove temp file on drop"
                    );
                }
            }
        }
    }
}
