use crate::models::db::Database;
use crate::models::error::RecommendError;
use crate::models::recommendation::RecommendationResult;
use crate::services::clock::Clock;
use crate::services::session::{RecommendationSession, SessionConfig};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedSession = Arc<Mutex<RecommendationSession>>;

struct CacheEntry {
    session: SharedSession,
    expires_at_ms: u64,
}

// Entries expire a fixed time after creation, independent of session refreshes
pub struct SessionCache {
    sessions: Mutex<HashMap<String, CacheEntry>>,
    store: Database,
    clock: Arc<dyn Clock>,
    defaults: SessionConfig,
    entry_lifetime_ms: u64,
    created: AtomicUsize,
}

impl SessionCache {
    pub fn new(
        store: Database,
        clock: Arc<dyn Clock>,
        defaults: SessionConfig,
        entry_lifetime_secs: u64,
    ) -> Self {
        SessionCache {
            sessions: Mutex::new(HashMap::new()),
            store,
            clock,
            defaults,
            entry_lifetime_ms: entry_lifetime_secs.saturating_mul(1000),
            created: AtomicUsize::new(0),
        }
    }

    pub async fn get_or_create(&self, uid: &str) -> SharedSession {
        let now = self.clock.now_ms();
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get(uid) {
            if now < entry.expires_at_ms {
                return entry.session.clone();
            }
            debug!("Session for '{}' expired, starting a new one", uid);
        }

        let session = Arc::new(Mutex::new(RecommendationSession::new(
            uid,
            self.defaults.clone(),
            self.store.clone(),
        )));
        sessions.insert(
            uid.to_string(),
            CacheEntry {
                session: session.clone(),
                expires_at_ms: now.saturating_add(self.entry_lifetime_ms),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        session
    }

    pub async fn recommend(&self, uid: &str) -> Result<RecommendationResult, RecommendError> {
        let session = self.get_or_create(uid).await;
        let mut session = session.lock().await;
        session.get(self.clock.now_ms()).await
    }

    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now < entry.expires_at_ms);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}
