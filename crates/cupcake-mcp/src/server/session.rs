//! Session management for the legacy SSE transport.
//!
//! Each `GET /sse` connection owns one session. Responses to
//! `POST /message?sessionId=` are pushed onto the session's broadcast
//! channel and delivered as `message` events.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use tokio::sync::{RwLock, broadcast};

/// Idle time after which a session is dropped.
const SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// How often stale sessions are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// An event queued for a session's SSE stream.
#[derive(Clone, Debug)]
pub struct SessionEvent {
    /// Monotonically increasing per session.
    pub id: u64,
    /// SSE event type ("endpoint" or "message").
    pub event_type: String,
    pub data: String,
}

impl SessionEvent {
    pub fn to_sse_event(&self) -> Event {
        Event::default().id(self.id.to_string()).event(self.event_type.clone()).data(self.data.clone())
    }
}

/// A single SSE session.
pub struct Session {
    pub id: String,
    tx: broadcast::Sender<SessionEvent>,
    next_event_id: AtomicU64,
    pub created_at: Instant,
    last_active: RwLock<Instant>,
}

impl Session {
    pub fn new(id: String) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            id,
            tx,
            next_event_id: AtomicU64::new(1),
            created_at: Instant::now(),
            last_active: RwLock::new(Instant::now()),
        }
    }

    /// Build the next event for this session without sending it.
    pub fn next_event(&self, event_type: impl Into<String>, data: impl Into<String>) -> SessionEvent {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        SessionEvent { id, event_type: event_type.into(), data: data.into() }
    }

    /// Broadcast an event to live subscribers. Returns the event ID.
    pub async fn push_event(&self, event_type: impl Into<String>, data: impl Into<String>) -> u64 {
        let event = self.next_event(event_type, data);
        let id = event.id;

        // No subscribers just means the stream has gone away.
        let _ = self.tx.send(event);
        self.touch().await;
        id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub async fn is_stale(&self) -> bool {
        self.last_active.read().await.elapsed() > SESSION_TIMEOUT
    }

    pub async fn touch(&self) {
        *self.last_active.write().await = Instant::now();
    }

    pub fn current_event_id(&self) -> u64 {
        self.next_event_id.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("current_event_id", &self.current_event_id())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Registry of live SSE sessions.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_session(&self) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.write().await.insert(id, Arc::clone(&session));

        tracing::info!(session_id = %session.id, "Created new session");
        session
    }

    pub async fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Removed session");
        }
        removed
    }

    /// Drop sessions idle for longer than the session timeout.
    pub async fn cleanup_stale_sessions(&self) -> usize {
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.is_stale().await {
                    stale.push(id.clone());
                }
            }
        }

        if !stale.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &stale {
                sessions.remove(id);
                tracing::info!(session_id = %id, "Cleaned up stale session");
            }
        }
        stale.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let cleaned = self.cleanup_stale_sessions().await;
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Session cleanup completed");
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = SessionManager::new();
        let session = manager.create_session().await;
        assert_eq!(session.id.len(), 32);
        assert_eq!(manager.session_count().await, 1);

        assert!(manager.get_session(&session.id).await.is_some());
        assert!(manager.get_session("nonexistent").await.is_none());

        assert!(manager.remove_session(&session.id).await);
        assert!(!manager.remove_session(&session.id).await);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_push_reaches_subscriber() {
        let session = Session::new("test".to_string());
        let mut rx = session.subscribe();

        let first = session.push_event("message", r#"{"n":1}"#).await;
        let second = session.push_event("message", r#"{"n":2}"#).await;
        assert_eq!((first, second), (1, 2));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "message");
        assert_eq!(event.data, r#"{"n":1}"#);
        assert_eq!(rx.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_push_without_subscribers() {
        let session = Session::new("test".to_string());
        assert_eq!(session.push_event("message", "{}").await, 1);
    }

    #[tokio::test]
    async fn test_fresh_sessions_not_swept() {
        let manager = SessionManager::new();
        manager.create_session().await;
        assert_eq!(manager.cleanup_stale_sessions().await, 0);
        assert_eq!(manager.session_count().await, 1);
    }
}
