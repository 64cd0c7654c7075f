//! Render surface synchronization.
//!
//! This module keeps registered rendering surfaces in step with the
//! current artifact:
//!
//! ```text
//! SessionController ──▶ RenderSurfaceManager ──▶ RenderSurface (0..n)
//!                          │
//!                          └── ArtifactHandle per (surface, version)
//! ```
//!
//! Each surface is bound to the artifact through an ephemeral
//! [`ArtifactHandle`]. On every artifact update the manager creates a
//! fresh handle per surface, binds it (retrying once after a settle
//! delay if the surface is not ready, then falling back to a direct
//! write), and retires the superseded handle. A superseded handle is
//! released immediately when its surface has signalled consumption,
//! otherwise after a bounded grace period.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::artifact::Artifact;

mod handle;
mod preview;

pub use handle::ArtifactHandle;
pub use preview::FilePreviewSurface;

/// How long to wait before retrying a bind on a not-yet-ready surface.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// How long a superseded, unconsumed handle stays valid before release.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Render surface errors.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Surface is not ready to receive content yet
    #[error("surface not ready")]
    NotReady,
    /// Surface refused the handle
    #[error("bind rejected: {0}")]
    BindRejected(String),
    /// IO error while writing surface content
    #[error("surface IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opaque rendering target that displays artifact payloads.
///
/// Implementations receive the payload either through [`bind`](Self::bind),
/// which hands over a handle the surface may load from, or through
/// [`write_direct`](Self::write_direct), the fallback in-place replacement
/// path used when binding fails.
#[async_trait]
pub trait RenderSurface: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Bind an artifact handle to this surface.
    ///
    /// May return [`SurfaceError::NotReady`] if the surface exists but
    /// cannot receive content yet; the manager retries after a settle
    /// delay.
    async fn bind(&mut self, handle: &ArtifactHandle) -> Result<(), SurfaceError>;

    /// Replace the surface content directly, bypassing handle binding.
    async fn write_direct(&mut self, payload: &str) -> Result<(), SurfaceError>;
}

/// Identifier for a registered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SurfaceEntry {
    id: SurfaceId,
    surface: Box<dyn RenderSurface>,
    handle: Option<ArtifactHandle>,
    /// Whether the surface signalled consumption of the current handle.
    consumed: bool,
}

struct RetiringHandle {
    handle: ArtifactHandle,
    deadline: Instant,
}

/// Owns the handle lifecycle for every registered render surface.
///
/// All registered surfaces reflect the highest artifact version the
/// manager has seen, independently of when they registered. Expired
/// retiring handles are swept whenever the manager is touched; anything
/// still held is reclaimed when the manager drops.
pub struct RenderSurfaceManager {
    entries: Vec<SurfaceEntry>,
    retiring: Vec<RetiringHandle>,
    latest: Option<Artifact>,
    next_id: u64,
    settle_delay: Duration,
    grace_period: Duration,
    spool_dir: Option<PathBuf>,
}

impl Default for RenderSurfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurfaceManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            retiring: Vec::new(),
            latest: None,
            next_id: 0,
            settle_delay: DEFAULT_SETTLE_DELAY,
            grace_period: DEFAULT_GRACE_PERIOD,
            spool_dir: None,
        }
    }

    /// Spool handle payloads to per-version files under `dir`.
    ///
    /// Without a spool directory handles are in-memory only.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_grace_period(mut self, period: Duration) -> Self {
        self.grace_period = period;
        self
    }

    /// Register a surface and bind it to the latest artifact, if any.
    pub async fn register(&mut self, surface: Box<dyn RenderSurface>) -> SurfaceId {
        self.sweep_expired();

        let id = SurfaceId(self.next_id);
        self.next_id += 1;

        let mut entry = SurfaceEntry {
            id,
            surface,
            handle: None,
            consumed: false,
        };

        if let Some(artifact) = self.latest.clone() {
            let handle = Self::create_handle(self.spool_dir.as_deref(), id, &artifact);
            Self::bind_or_fallback(entry.surface.as_mut(), &handle, self.settle_delay).await;
            entry.handle = Some(handle);
        }

        tracing::debug!(surface = %id, name = entry.surface.name(), "registered render surface");
        self.entries.push(entry);
        id
    }

    /// Unregister a surface, releasing its handle.
    ///
    /// Returns `false` if no surface has that id.
    pub fn unregister(&mut self, id: SurfaceId) -> bool {
        self.sweep_expired();

        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let mut entry = self.entries.remove(pos);
        if let Some(mut handle) = entry.handle.take() {
            handle.release();
        }
        tracing::debug!(surface = %id, "unregistered render surface");
        true
    }

    /// Rebind every registered surface to a new artifact version.
    ///
    /// Superseded handles are released immediately if consumed, otherwise
    /// parked until their grace deadline.
    pub async fn on_artifact_updated(&mut self, artifact: &Artifact) {
        self.sweep_expired();
        self.latest = Some(artifact.clone());

        let settle_delay = self.settle_delay;
        let grace_period = self.grace_period;
        let spool_dir = self.spool_dir.clone();

        for entry in &mut self.entries {
            let handle = Self::create_handle(spool_dir.as_deref(), entry.id, artifact);
            Self::bind_or_fallback(entry.surface.as_mut(), &handle, settle_delay).await;

            let superseded = entry.handle.replace(handle);
            let consumed = std::mem::replace(&mut entry.consumed, false);
            if let Some(mut old) = superseded {
                if consumed {
                    old.release();
                } else {
                    self.retiring.push(RetiringHandle {
                        handle: old,
                        deadline: Instant::now() + grace_period,
                    });
                }
            }
        }
    }

    /// Record that a surface finished consuming its current handle.
    ///
    /// Returns `false` if the surface is unknown or holds no handle.
    pub fn mark_consumed(&mut self, id: SurfaceId) -> bool {
        self.sweep_expired();

        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.handle.is_some() => {
                entry.consumed = true;
                true
            }
            _ => false,
        }
    }

    pub fn surface_count(&self) -> usize {
        self.entries.len()
    }

    /// Superseded handles still waiting out their grace period.
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    /// Version of the latest artifact the manager has seen.
    pub fn latest_version(&self) -> Option<u64> {
        self.latest.as_ref().map(Artifact::version)
    }

    /// Version currently bound to the given surface.
    pub fn bound_version(&self, id: SurfaceId) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.handle.as_ref())
            .map(ArtifactHandle::version)
    }

    fn create_handle(
        spool_dir: Option<&std::path::Path>,
        id: SurfaceId,
        artifact: &Artifact,
    ) -> ArtifactHandle {
        if let Some(dir) = spool_dir {
            let path = dir.join(format!("artifact-v{}-s{}.html", artifact.version(), id));
            match ArtifactHandle::spooled(artifact, path) {
                Ok(handle) => return handle,
                Err(err) => {
                    tracing::warn!(surface = %id, error = %err, "spooling handle failed, using in-memory handle");
                }
            }
        }
        ArtifactHandle::in_memory(artifact)
    }

    async fn bind_or_fallback(
        surface: &mut dyn RenderSurface,
        handle: &ArtifactHandle,
        settle_delay: Duration,
    ) {
        let bind_result = match surface.bind(handle).await {
            Err(SurfaceError::NotReady) => {
                tracing::debug!(
                    name = surface.name(),
                    "surface not ready, retrying bind after settle delay"
                );
                tokio::time::sleep(settle_delay).await;
                surface.bind(handle).await
            }
            other => other,
        };

        if let Err(err) = bind_result {
            tracing::warn!(name = surface.name(), error = %err, "bind failed, falling back to direct write");
            if let Err(err) = surface.write_direct(handle.payload()).await {
                tracing::warn!(name = surface.name(), error = %err, "direct write fallback failed");
            }
        }
    }

    /// Release retiring handles whose grace deadline has passed.
    fn sweep_expired(&mut self) {
        if self.retiring.is_empty() {
            return;
        }
        let now = Instant::now();
        self.retiring.retain_mut(|retiring| {
            if now >= retiring.deadline {
                retiring.handle.release();
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SurfaceLog {
        bound: Vec<(u64, String)>,
        direct: Vec<String>,
        not_ready_remaining: u32,
        reject_binds: bool,
    }

    struct TestSurface {
        log: Arc<Mutex<SurfaceLog>>,
    }

    impl TestSurface {
        fn new() -> (Self, Arc<Mutex<SurfaceLog>>) {
            let log = Arc::new(Mutex::new(SurfaceLog::default()));
            (Self { log: log.clone() }, log)
        }

        fn not_ready_once() -> (Self, Arc<Mutex<SurfaceLog>>) {
            let (surface, log) = Self::new();
            log.lock().unwrap().not_ready_remaining = 1;
            (surface, log)
        }

        fn rejecting() -> (Self, Arc<Mutex<SurfaceLog>>) {
            let (surface, log) = Self::new();
            log.lock().unwrap().reject_binds = true;
            (surface, log)
        }
    }

    #[async_trait]
    impl RenderSurface for TestSurface {
        fn name(&self) -> &str {
            "test-surface"
        }

        async fn bind(&mut self, handle: &ArtifactHandle) -> Result<(), SurfaceError> {
            let mut log = self.log.lock().unwrap();
            if log.not_ready_remaining > 0 {
                log.not_ready_remaining -= 1;
                return Err(SurfaceError::NotReady);
            }
            if log.reject_binds {
                return Err(SurfaceError::BindRejected("sandbox".to_string()));
            }
            log.bound.push((handle.version(), handle.payload().to_string()));
            Ok(())
        }

        async fn write_direct(&mut self, payload: &str) -> Result<(), SurfaceError> {
            self.log.lock().unwrap().direct.push(payload.to_string());
            Ok(())
        }
    }

    fn fast_manager() -> RenderSurfaceManager {
        RenderSurfaceManager::new()
            .with_settle_delay(Duration::from_millis(5))
            .with_grace_period(Duration::from_millis(20))
    }

    fn artifact(store: &mut ArtifactStore, payload: &str) -> Artifact {
        store.set(payload).clone()
    }

    #[tokio::test]
    async fn test_register_before_any_artifact_binds_nothing() {
        let mut manager = fast_manager();
        let (surface, log) = TestSurface::new();

        let id = manager.register(Box::new(surface)).await;

        assert!(log.lock().unwrap().bound.is_empty());
        assert_eq!(manager.surface_count(), 1);
        assert_eq!(manager.bound_version(id), None);
    }

    #[tokio::test]
    async fn test_update_binds_all_surfaces_to_same_payload() {
        let mut manager = fast_manager();
        let (first, first_log) = TestSurface::new();
        let (second, second_log) = TestSurface::new();
        manager.register(Box::new(first)).await;
        manager.register(Box::new(second)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>one</p>"))
            .await;
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>two</p>"))
            .await;

        let first_last = first_log.lock().unwrap().bound.last().cloned().unwrap();
        let second_last = second_log.lock().unwrap().bound.last().cloned().unwrap();
        assert_eq!(first_last, (2, "<p>two</p>".to_string()));
        assert_eq!(first_last, second_last);
    }

    #[tokio::test]
    async fn test_register_after_update_binds_latest() {
        let mut manager = fast_manager();
        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v1</p>"))
            .await;
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v2</p>"))
            .await;

        let (surface, log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        let bound = log.lock().unwrap().bound.clone();
        assert_eq!(bound, vec![(2, "<p>v2</p>".to_string())]);
        assert_eq!(manager.bound_version(id), Some(2));
    }

    #[tokio::test]
    async fn test_not_ready_surface_retried_after_settle_delay() {
        let mut manager = fast_manager();
        let (surface, log) = TestSurface::not_ready_once();
        manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>retry</p>"))
            .await;

        let log = log.lock().unwrap();
        assert_eq!(log.bound, vec![(1, "<p>retry</p>".to_string())]);
        assert!(log.direct.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_bind_falls_back_to_direct_write() {
        let mut manager = fast_manager();
        let (surface, log) = TestSurface::rejecting();
        manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>fallback</p>"))
            .await;

        let log = log.lock().unwrap();
        assert!(log.bound.is_empty());
        assert_eq!(log.direct, vec!["<p>fallback</p>".to_string()]);
    }

    #[tokio::test]
    async fn test_superseded_handle_survives_until_grace_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = fast_manager().with_spool_dir(dir.path());
        let (surface, _log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v1</p>"))
            .await;
        let v1_path = dir.path().join(format!("artifact-v1-s{}.html", id));
        assert!(v1_path.exists());

        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v2</p>"))
            .await;
        // Not consumed: v1 is parked, its file stays valid through the grace period.
        assert!(v1_path.exists());
        assert_eq!(manager.retiring_count(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v3</p>"))
            .await;

        assert!(!v1_path.exists());
        let v2_path = dir.path().join(format!("artifact-v2-s{}.html", id));
        assert!(v2_path.exists());
        assert_eq!(manager.retiring_count(), 1);
    }

    #[tokio::test]
    async fn test_consumed_handle_released_immediately_on_supersede() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = fast_manager().with_spool_dir(dir.path());
        let (surface, _log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v1</p>"))
            .await;
        assert!(manager.mark_consumed(id));

        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v2</p>"))
            .await;

        let v1_path = dir.path().join(format!("artifact-v1-s{}.html", id));
        assert!(!v1_path.exists());
        assert_eq!(manager.retiring_count(), 0);
    }

    #[tokio::test]
    async fn test_mark_consumed_without_handle_returns_false() {
        let mut manager = fast_manager();
        let (surface, _log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        assert!(!manager.mark_consumed(id));
    }

    #[tokio::test]
    async fn test_unregister_releases_current_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = fast_manager().with_spool_dir(dir.path());
        let (surface, _log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>v1</p>"))
            .await;

        assert!(manager.unregister(id));
        assert!(!manager.unregister(id));

        let v1_path = dir.path().join(format!("artifact-v1-s{}.html", id));
        assert!(!v1_path.exists());
        assert_eq!(manager.surface_count(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_handles_without_spool_dir() {
        let mut manager = fast_manager();
        let (surface, log) = TestSurface::new();
        let id = manager.register(Box::new(surface)).await;

        let mut store = ArtifactStore::new();
        manager
            .on_artifact_updated(&artifact(&mut store, "<p>mem</p>"))
            .await;

        assert_eq!(manager.bound_version(id), Some(1));
        assert_eq!(
            log.lock().unwrap().bound,
            vec![(1, "<p>mem</p>".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dropping_manager_reclaims_spooled_handles() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::new();
        let v1_path;
        {
            let mut manager = fast_manager().with_spool_dir(dir.path());
            let (surface, _log) = TestSurface::new();
            let id = manager.register(Box::new(surface)).await;
            manager
                .on_artifact_updated(&artifact(&mut store, "<p>v1</p>"))
                .await;
            manager
                .on_artifact_updated(&artifact(&mut store, "<p>v2</p>"))
                .await;
            v1_path = dir.path().join(format!("artifact-v1-s{}.html", id));
            assert!(v1_path.exists());
        }

        assert!(!v1_path.exists());
        assert!(!dir.path().join("artifact-v2-s0.html").exists());
    }
}
