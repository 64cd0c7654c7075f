//! Ephemeral artifact handles.
//!
//! A handle binds one render surface to one artifact version. Handles are
//! created and released by the [`RenderSurfaceManager`](super::RenderSurfaceManager);
//! surfaces only ever see a shared reference during bind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::Artifact;

use super::SurfaceError;

/// Backing storage for a handle's payload.
#[derive(Debug)]
enum HandleBacking {
    /// Payload lives only in memory.
    InMemory,
    /// Payload was spooled to a per-version file.
    File(PathBuf),
}

/// An ephemeral, revocable reference binding a surface to an artifact payload.
///
/// Each handle belongs to exactly one (surface, artifact version) pair and is
/// never shared or reused across versions. Release happens exactly once; a
/// file-backed handle deletes its spool file on release. Backing is also
/// reclaimed on drop if the handle was never explicitly released.
#[derive(Debug)]
pub struct ArtifactHandle {
    version: u64,
    payload: Arc<str>,
    backing: HandleBacking,
    released: bool,
}

impl ArtifactHandle {
    /// Create a handle whose payload lives in memory only.
    pub(crate) fn in_memory(artifact: &Artifact) -> Self {
        Self {
            version: artifact.version(),
            payload: artifact.payload().clone(),
            backing: HandleBacking::InMemory,
            released: false,
        }
    }

    /// Create a handle backed by a spool file at `path`.
    ///
    /// Writes the payload to the file before returning, so the surface can
    /// load from the path as soon as it holds the handle.
    pub(crate) fn spooled(artifact: &Artifact, path: PathBuf) -> Result<Self, SurfaceError> {
        std::fs::write(&path, artifact.payload().as_bytes())?;
        Ok(Self {
            version: artifact.version(),
            payload: artifact.payload().clone(),
            backing: HandleBacking::File(path),
            released: false,
        })
    }

    /// Artifact version this handle carries.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The artifact payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Path of the spool file for a file-backed handle.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            HandleBacking::File(path) => Some(path),
            HandleBacking::InMemory => None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the handle's backing storage. Idempotent.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let HandleBacking::File(path) = &self.backing {
            if let Err(err) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove handle spool file");
            } else {
                tracing::debug!(version = self.version, path = %path.display(), "released file-backed handle");
            }
        }
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(version = self.version, "reclaiming unreleased handle on drop");
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;

    fn artifact(payload: &str) -> Artifact {
        let mut store = ArtifactStore::new();
        store.set(payload).clone()
    }

    #[test]
    fn test_in_memory_handle() {
        let handle = ArtifactHandle::in_memory(&artifact("<p>hi</p>"));
        assert_eq!(handle.version(), 1);
        assert_eq!(handle.payload(), "<p>hi</p>");
        assert!(handle.path().is_none());
        assert!(!handle.is_released());
    }

    #[test]
    fn test_spooled_handle_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact-v1-s0.html");

        let handle = ArtifactHandle::spooled(&artifact("<p>spooled</p>"), path.clone()).unwrap();

        assert_eq!(handle.path(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>spooled</p>");
    }

    #[test]
    fn test_release_removes_spool_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact-v1-s0.html");

        let mut handle = ArtifactHandle::spooled(&artifact("<p>x</p>"), path.clone()).unwrap();
        handle.release();

        assert!(handle.is_released());
        assert!(!path.exists());

        // Second release is a no-op.
        handle.release();
        assert!(handle.is_released());
    }

    #[test]
    fn test_drop_reclaims_backing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact-v1-s0.html");

        {
            let _handle = ArtifactHandle::spooled(&artifact("<p>x</p>"), path.clone()).unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_spool_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-subdir").join("artifact.html");

        let result = ArtifactHandle::spooled(&artifact("<p>x</p>"), path);
        assert!(matches!(result, Err(SurfaceError::Io(_))));
    }
}
