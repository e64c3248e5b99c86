use anyhow::Result;
use pdf_combiner_core::{AppConfig, OverlayEditor, PdfCombiner};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::source_store::SourceStore;

/// Sessions untouched for this long are dropped by the cleanup task.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// One user's working set: the page list, the open editor and the uploads.
pub struct Session {
    pub combiner: PdfCombiner,
    /// Overlay editor, if a page is open for editing
    pub editor: Option<OverlayEditor>,
    /// Disk-backed storage for uploaded sources
    pub sources: SourceStore,
    pub created_at: Instant,
    /// Milliseconds after `created_at` of the last access
    last_active_ms: AtomicU64,
    /// Set while a load or export runs for this session
    busy: Arc<AtomicBool>,
}

impl Session {
    /// Claim the session for a load or export.
    ///
    /// Returns `None` if one is already running. The claim is released when
    /// the guard drops, so it can be held across `.await` without the lock.
    pub fn try_begin_job(&self) -> Option<BusyGuard> {
        BusyGuard::try_acquire(&self.busy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Record an access. Works under the read lock.
    fn touch(&self) {
        let elapsed = u64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn last_active(&self) -> Instant {
        self.created_at + Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed))
    }

    /// Drop the editor if its page is gone.
    pub fn sync_editor(&mut self) {
        if let Some(editor) = &self.editor
            && self.combiner.model().get(editor.entry_id()).is_none()
        {
            self.editor = None;
        }
    }
}

/// RAII claim on a session's busy flag.
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Global application state
pub struct AppState {
    /// Active sessions indexed by UUID
    sessions: RwLock<HashMap<Uuid, Session>>,
    /// Configuration every new session starts from
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Create an empty session.
    ///
    /// Returns the session ID as a string (for URL embedding).
    /// Returns an error if the source store cannot be created.
    pub async fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4();

        let sources = SourceStore::new()
            .map_err(|e| anyhow::anyhow!("Failed to create source store: {e}"))?;

        let session = Session {
            combiner: PdfCombiner::new(self.config.clone()),
            editor: None,
            sources,
            created_at: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            busy: Arc::new(AtomicBool::new(false)),
        };

        self.sessions.write().await.insert(id, session);
        Ok(id.to_string())
    }

    /// Get a session by ID string.
    ///
    /// Returns `None` if the ID is not a valid UUID or session doesn't exist.
    pub async fn get_session(&self, id: &str) -> Option<SessionRef<'_>> {
        let uuid = Uuid::parse_str(id).ok()?;
        let sessions = self.sessions.read().await;
        if sessions.contains_key(&uuid) {
            Some(SessionRef {
                id: uuid,
                state: self,
            })
        } else {
            None
        }
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return false;
        };
        self.sessions.write().await.remove(&uuid).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for [`SESSION_IDLE_TIMEOUT`], unless a job is running.
    pub async fn cleanup_old_sessions(&self) -> usize {
        self.cleanup_idle_for(SESSION_IDLE_TIMEOUT).await
    }

    async fn cleanup_idle_for(&self, timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();

        sessions.retain(|_, session| {
            session.is_busy() || now.saturating_duration_since(session.last_active()) < timeout
        });
        before - sessions.len()
    }
}

/// A borrowed reference to a session that provides safe access patterns.
///
/// Holding a `tokio::sync::RwLock` guard across an `.await` would block every
/// other request of every session. Instead the lock is only taken inside
/// synchronous closures:
///
/// ```ignore
/// // Lock is released before the blocking work starts
/// let pages = session.with_session(|s| s.combiner.model().export_pages()).await?;
/// tokio::task::spawn_blocking(move || exporter.export_to_bytes(&pages)).await;
/// ```
pub struct SessionRef<'a> {
    id: Uuid,
    state: &'a AppState,
}

impl SessionRef<'_> {
    pub fn id(&self) -> String {
        self.id.to_string()
    }

    /// Access session data immutably within a closure.
    ///
    /// The closure runs synchronously while holding a read lock.
    /// The lock is released before this method returns.
    pub async fn with_session<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        let sessions = self.state.sessions.read().await;
        sessions.get(&self.id).map(|session| {
            session.touch();
            f(session)
        })
    }

    /// Access session data mutably within a closure.
    ///
    /// The closure runs synchronously while holding a write lock.
    /// The lock is released before this method returns.
    pub async fn with_session_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.state.sessions.write().await;
        sessions.get_mut(&self.id).map(|session| {
            session.touch();
            f(session)
        })
    }
}
