//! File-backed preview surface.
//!
//! Renders artifacts by writing them to a stable file path, so a browser
//! tab pointed at that file shows the latest payload after a reload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ArtifactHandle, RenderSurface, SurfaceError};

/// A render surface that mirrors the artifact into a single preview file.
///
/// Binding copies the handle payload to the preview path rather than
/// pointing at the handle's own backing, so the path stays stable across
/// versions.
#[derive(Debug)]
pub struct FilePreviewSurface {
    path: PathBuf,
    last_version: Option<u64>,
}

impl FilePreviewSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_version: None,
        }
    }

    /// The stable preview file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version of the last artifact written through bind.
    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }
}

#[async_trait]
impl RenderSurface for FilePreviewSurface {
    fn name(&self) -> &str {
        "file-preview"
    }

    async fn bind(&mut self, handle: &ArtifactHandle) -> Result<(), SurfaceError> {
        std::fs::write(&self.path, handle.payload().as_bytes())?;
        self.last_version = Some(handle.version());
        tracing::debug!(
            version = handle.version(),
            path = %self.path.display(),
            "preview updated"
        );
        Ok(())
    }

    async fn write_direct(&mut self, payload: &str) -> Result<(), SurfaceError> {
        std::fs::write(&self.path, payload.as_bytes())?;
        Ok(())
    }
}
