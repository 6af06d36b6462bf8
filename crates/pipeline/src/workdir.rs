//! Per-run working directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use slidecast_common::error::SlidecastResult;

/// Scratch directory exclusively owned by one run.
///
/// Removed by [`WorkDir::remove`] on the terminal transition; dropping an
/// unremoved directory removes it synchronously as a fallback.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    /// Create `<root>/<session_id>_<stamp>`. A numeric suffix is appended if
    /// that name is already taken, so two runs never share a directory.
    pub fn create(root: &Path, session_id: &str, stamp: &str) -> SlidecastResult<Self> {
        std::fs::create_dir_all(root)?;
        let base = format!("{session_id}_{stamp}");
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            let path = root.join(name);
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Created work directory");
                    return Ok(Self {
                        path,
                        removed: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory tree. Calling it again is a no-op.
    pub async fn remove(&mut self) -> SlidecastResult<()> {
        if self.removed {
            return Ok(());
        }
        remove_work_dir(&self.path).await?;
        self.removed = true;
        Ok(())
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove work directory on drop");
            }
        }
    }
}

/// Remove a working directory tree. An already missing directory is not an
/// error.
pub async fn remove_work_dir(path: &Path) -> SlidecastResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed work directory");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Move a finished artifact to its published location, copying when a
/// rename is not possible (different filesystems).
pub async fn publish(src: &Path, dest: &Path) -> SlidecastResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(e) = tokio::fs::rename(src, dest).await {
        tracing::debug!(error = %e, "Rename failed, copying artifact instead");
        tokio::fs::copy(src, dest).await?;
        tokio::fs::remove_file(src).await?;
    }
    Ok(())
}
