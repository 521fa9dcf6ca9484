// src/scratch.rs

//! Scratch space for pipeline invocations
//!
//! Every inbound bundle, converted archive and extraction output directory
//! lives under a shared scratch root, namespaced by a fresh token so that
//! concurrent invocations never collide. Isolation comes from naming alone,
//! there is no locking.
//!
//! A [`ScratchGuard`] tracks every path allocated during one invocation and
//! releases all of them at the end, whichever exit path was taken. Release
//! failures are logged and collected, never returned as errors. If a guard is
//! dropped without being released (panic, cancelled future) its `Drop` impl
//! performs a best-effort cleanup, on the blocking pool when a runtime is
//! available.

use crate::error::Result;
use futures::future::join_all;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Kind of scratch resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    /// Inbound Android App Bundle
    Bundle,
    /// Converted APK set archive
    Archive,
    /// Output directory for one extraction
    OutputDir,
}

impl ScratchKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Archive => "archive",
            Self::OutputDir => "extract",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Bundle => ".aab",
            Self::Archive => ".apks",
            Self::OutputDir => "",
        }
    }

    /// Whether allocation creates a directory
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::OutputDir)
    }
}

/// A path that could not be deleted
#[derive(Debug)]
pub struct ReleaseFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

impl fmt::Display for ReleaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Stateless allocator rooted at a scratch directory
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a uniquely named path for `kind`
    ///
    /// Directories are created; files are only named, the caller writes them.
    pub async fn allocate(&self, kind: ScratchKind) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let token = Uuid::new_v4().simple();
        let path = self
            .root
            .join(format!("{}_{}{}", kind.prefix(), token, kind.extension()));

        if kind.is_dir() {
            tokio::fs::create_dir(&path).await?;
        }

        debug!("Allocated scratch {:?}: {}", kind, path.display());
        Ok(path)
    }

    /// Delete every path concurrently, collecting failures
    ///
    /// A path that is already gone counts as released.
    pub async fn release_all(paths: &[PathBuf]) -> Vec<ReleaseFailure> {
        let results = join_all(paths.iter().map(|path| async move {
            remove_path(path).await.map_err(|error| ReleaseFailure {
                path: path.clone(),
                error,
            })
        }))
        .await;

        let failures: Vec<ReleaseFailure> = results.into_iter().filter_map(|r| r.err()).collect();
        for failure in &failures {
            warn!("Failed to delete scratch path {}", failure);
        }
        failures
    }

    /// Start tracking allocations for one invocation
    pub fn guard(&self) -> ScratchGuard {
        ScratchGuard {
            space: self.clone(),
            paths: Vec::new(),
        }
    }
}

async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Scratch path never materialized: {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

fn remove_path_blocking(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Tracks the scratch paths owned by one pipeline invocation
pub struct ScratchGuard {
    space: ScratchSpace,
    paths: Vec<PathBuf>,
}

impl ScratchGuard {
    /// Allocate a path and register it for release
    pub async fn allocate(&mut self, kind: ScratchKind) -> Result<PathBuf> {
        let path = self.space.allocate(kind).await?;
        self.paths.push(path.clone());
        Ok(path)
    }

    /// Paths allocated so far
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Release every tracked path
    pub async fn release(mut self) -> Vec<ReleaseFailure> {
        let paths = std::mem::take(&mut self.paths);
        if paths.is_empty() {
            return Vec::new();
        }
        debug!("Releasing {} scratch paths", paths.len());
        ScratchSpace::release_all(&paths).await
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if self.paths.is_empty() {
            return;
        }
        warn!(
            "Scratch guard dropped with {} unreleased paths, cleaning up",
            self.paths.len()
        );
        let paths = std::mem::take(&mut self.paths);
        let cleanup = move || {
            for path in paths {
                if let Err(e) = remove_path_blocking(&path) {
                    warn!("Failed to delete scratch path {}: {}", path.display(), e);
                }
            }
        };

        // keep blocking filesystem work off the runtime workers
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(cleanup);
            }
            Err(_) => cleanup(),
        }
    }
}
