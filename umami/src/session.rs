//! In-memory per-user session store.
//!
//! Single-process only: sessions are short-lived and re-derivable by
//! searching again, so loss on restart is acceptable. Multi-process
//! deployments would need external shared storage; that is a
//! documented limitation, not something this module papers over.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::models::{SessionMode, UserSession};

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, UserSession>>,
    /// Per-user locks serializing transitions. Events for one user are
    /// processed in arrival order; different users run in parallel.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    generation: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.read().await.get(user_id).cloned()
    }

    pub async fn set(&self, user_id: &str, session: UserSession) {
        self.sessions
            .write()
            .await
            .insert(user_id.to_string(), session);
    }

    pub async fn clear(&self, user_id: &str) {
        self.sessions.write().await.remove(user_id);
    }

    /// Create a fresh session for the user with a new generation,
    /// replacing whatever was there. Returns the stored session.
    pub async fn create(&self, user_id: &str, mode: SessionMode) -> UserSession {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let session = UserSession::new(mode, generation);
        self.set(user_id, session.clone()).await;
        session
    }

    /// Acquire the per-user transition lock. Held across a whole
    /// controller transition so events for one user never interleave.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Whether the user's session still exists at the given generation.
    /// Deferred work calls this before applying a late result.
    pub async fn is_current(&self, user_id: &str, generation: u64) -> bool {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|s| s.generation == generation)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_clear_is_absent() {
        let store = SessionStore::new();
        store.create("u1", SessionMode::AwaitingSelection).await;
        assert!(store.get("u1").await.is_some());

        store.clear("u1").await;
        assert!(store.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_create_bumps_generation() {
        let store = SessionStore::new();
        let first = store.create("u1", SessionMode::AwaitingSelection).await;
        let second = store.create("u1", SessionMode::AwaitingLocation).await;
        assert!(second.generation > first.generation);
        assert!(!store.is_current("u1", first.generation).await);
        assert!(store.is_current("u1", second.generation).await);
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let store = SessionStore::new();
        store.create("u1", SessionMode::AwaitingSelection).await;
        store.create("u2", SessionMode::AwaitingComment).await;

        store.clear("u1").await;
        assert!(store.get("u1").await.is_none());
        let u2 = store.get("u2").await.expect("u2 survives u1's clear");
        assert_eq!(u2.mode, SessionMode::AwaitingComment);
    }

    #[tokio::test]
    async fn test_is_current_false_after_clear() {
        let store = SessionStore::new();
        let session = store.create("u1", SessionMode::AwaitingSaveDecision).await;
        store.clear("u1").await;
        assert!(!store.is_current("u1", session.generation).await);
    }

    #[tokio::test]
    async fn test_lock_user_serializes() {
        let store = Arc::new(SessionStore::new());

        let guard = store.lock_user("u1").await;
        let store2 = store.clone();
        let pending = tokio::spawn(async move {
            let _g = store2.lock_user("u1").await;
        });

        // Second acquisition must wait until the guard drops.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!pending.is_finished());

        drop(guard);
        pending.await.unwrap();
    }
}
