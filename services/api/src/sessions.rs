//! In-Memory Session Store
//!
//! Sessions exist only for the lifetime of the process. Each session sits
//! behind its own mutex so two turns of the same conversation never run
//! concurrently, while different sessions proceed independently.

use bubbly_core::SessionState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new session and returns its id.
    pub async fn insert(&self, state: SessionState) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));
        info!(session_id = %id, "Session created");
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drops a session and everything it learned. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session discarded");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = SessionStore::new();
        let id = store.insert(SessionState::default()).await;

        assert_eq!(store.len().await, 1);
        let session = store.get(id).await.expect("session should exist");
        session.lock().await.set_child_name("Mia");
        assert_eq!(
            store.get(id).await.unwrap().lock().await.child_name(),
            Some("Mia")
        );

        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
        assert!(store.get(id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_id_is_absent() {
        let store = SessionStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }
}
