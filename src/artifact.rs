//! Versioned rendering artifact storage.
//!
//! A generation exchange may produce a rendering artifact (an HTML
//! document) alongside the text transcript. The store keeps the latest
//! artifact together with a monotonically increasing version number so
//! render surfaces can tell stale payloads from current ones.

use std::sync::Arc;

/// One version of the rendering artifact.
///
/// The payload is shared rather than cloned: surfaces and handles hold
/// the same backing string.
#[derive(Debug, Clone)]
pub struct Artifact {
    payload: Arc<str>,
    version: u64,
}

impl Artifact {
    pub fn payload(&self) -> &Arc<str> {
        &self.payload
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Holds the current rendering artifact, if any.
///
/// Versions start at 1 and increase by one per store, including stores
/// of a payload identical to the current one. A replaced payload is
/// dropped once the last handle referencing it goes away.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    current: Option<Artifact>,
    next_version: u64,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self {
            current: None,
            next_version: 0,
        }
    }

    /// Store a new artifact payload and return the stored artifact.
    pub fn set(&mut self, payload: impl Into<Arc<str>>) -> &Artifact {
        self.next_version += 1;
        let artifact = Artifact {
            payload: payload.into(),
            version: self.next_version,
        };
        tracing::debug!(
            version = artifact.version,
            bytes = artifact.len(),
            "stored rendering artifact"
        );
        self.current.insert(artifact)
    }

    /// The current artifact, or `None` if nothing was generated yet.
    pub fn current(&self) -> Option<&Artifact> {
        self.current.as_ref()
    }

    /// Version of the current artifact, or 0 before the first store.
    pub fn version(&self) -> u64 {
        self.current.as_ref().map(Artifact::version).unwrap_or(0)
    }

    /// Drop the current artifact without resetting the version counter.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = ArtifactStore::new();
        assert!(store.current().is_none());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_first_set_is_version_one() {
        let mut store = ArtifactStore::new();
        let artifact = store.set("<html>a</html>");
        assert_eq!(artifact.version(), 1);
        assert_eq!(artifact.payload().as_ref(), "<html>a</html>");
    }

    #[test]
    fn test_versions_increase_monotonically() {
        let mut store = ArtifactStore::new();
        store.set("<p>1</p>");
        store.set("<p>2</p>");
        let third = store.set("<p>3</p>");

        assert_eq!(third.version(), 3);
        assert_eq!(store.version(), 3);
        assert_eq!(store.current().unwrap().payload().as_ref(), "<p>3</p>");
    }

    #[test]
    fn test_identical_payload_still_bumps_version() {
        let mut store = ArtifactStore::new();
        store.set("<p>same</p>");
        let second = store.set("<p>same</p>");
        assert_eq!(second.version(), 2);
    }

    #[test]
    fn test_payload_survives_replacement_while_referenced() {
        let mut store = ArtifactStore::new();
        let held = store.set("<p>old</p>").payload().clone();
        store.set("<p>new</p>");

        assert_eq!(held.as_ref(), "<p>old</p>");
        assert_eq!(store.current().unwrap().payload().as_ref(), "<p>new</p>");
    }

    #[test]
    fn test_clear_keeps_version_counter() {
        let mut store = ArtifactStore::new();
        store.set("<p>1</p>");
        store.clear();
        assert!(store.current().is_none());

        let next = store.set("<p>2</p>");
        assert_eq!(next.version(), 2);
    }
}
