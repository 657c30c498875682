//! Sandbox directories for rooms.
//!
//! A [`SandboxLease`] owns the directories backing one room. Dropping it
//! releases them, so cleanup happens on every exit path without relying on
//! anyone remembering to call it. Cleanup is best-effort: failures are logged
//! and recorded, never raised.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::EnvironmentError;

/// Allocates and removes sandbox directories.
pub trait SandboxAllocator: Send + Sync {
    fn create_directory(&self, prefix: &str) -> Result<PathBuf, EnvironmentError>;

    fn exists(&self, path: &Path) -> bool;

    /// Remove `path`. Idempotent; must not panic or fail loudly.
    fn cleanup(&self, path: &Path);
}

/// A directory that could not be removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub detail: String,
}

/// Allocates sandboxes as fresh temporary directories.
#[derive(Debug, Default)]
pub struct TempSandboxAllocator {
    root: Option<PathBuf>,
    failures: Mutex<Vec<CleanupFailure>>,
}

impl TempSandboxAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate under `root` instead of the system temp directory.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn cleanup_failures(&self) -> Vec<CleanupFailure> {
        self.failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }
}

impl SandboxAllocator for TempSandboxAllocator {
    fn create_directory(&self, prefix: &str) -> Result<PathBuf, EnvironmentError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|err| EnvironmentError::Sandbox(format!("create sandbox: {err}")))?;
        let path = dir.keep();
        debug!(path = %path.display(), "sandbox allocated");
        Ok(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn cleanup(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        match fs::remove_dir_all(path) {
            Ok(()) => debug!(path = %path.display(), "sandbox removed"),
            Err(err) => {
                warn!(path = %path.display(), err = %err, "sandbox cleanup failed");
                if let Ok(mut failures) = self.failures.lock() {
                    failures.push(CleanupFailure {
                        path: path.to_path_buf(),
                        detail: err.to_string(),
                    });
                }
            }
        }
    }
}

/// The directories a room works in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxPaths {
    primary: PathBuf,
    auxiliary: BTreeMap<String, PathBuf>,
}

impl SandboxPaths {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn with_auxiliary(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.auxiliary.insert(name.into(), path.into());
        self
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn auxiliary(&self, name: &str) -> Option<&Path> {
        self.auxiliary.get(name).map(PathBuf::as_path)
    }

    pub fn auxiliaries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.auxiliary
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }
}

/// Scoped ownership of one room's sandbox directories.
pub struct SandboxLease {
    allocator: Arc<dyn SandboxAllocator>,
    paths: SandboxPaths,
    keep_primary: bool,
}

impl SandboxLease {
    /// Allocate a primary directory (or adopt `reuse`) plus one directory per
    /// auxiliary name. On failure everything allocated so far is released.
    pub fn acquire(
        allocator: Arc<dyn SandboxAllocator>,
        prefix: &str,
        auxiliary: &[String],
        reuse: Option<PathBuf>,
    ) -> Result<Self, EnvironmentError> {
        let primary = match reuse {
            Some(path) if allocator.exists(&path) => path,
            _ => allocator.create_directory(prefix)?,
        };
        let mut lease = Self {
            allocator,
            paths: SandboxPaths::new(primary),
            keep_primary: false,
        };
        for name in auxiliary {
            // An early return drops `lease`, which releases what it holds.
            let path = lease
                .allocator
                .create_directory(&format!("{prefix}{name}-"))?;
            lease.paths.auxiliary.insert(name.clone(), path);
        }
        Ok(lease)
    }

    pub fn paths(&self) -> &SandboxPaths {
        &self.paths
    }

    pub fn primary(&self) -> &Path {
        self.paths.primary()
    }

    /// Release the auxiliary directories but hand the primary directory over
    /// to the caller instead of deleting it.
    pub fn into_primary(mut self) -> PathBuf {
        self.keep_primary = true;
        self.paths.primary.clone()
    }
}

impl Drop for SandboxLease {
    fn drop(&mut self) {
        for path in self.paths.auxiliary.values() {
            self.allocator.cleanup(path);
        }
        if !self.keep_primary {
            self.allocator.cleanup(&self.paths.primary);
        }
    }
}

impl std::fmt::Debug for SandboxLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxLease")
            .field("paths", &self.paths)
            .field("keep_primary", &self.keep_primary)
            .finish_non_exhaustive()
    }
}
