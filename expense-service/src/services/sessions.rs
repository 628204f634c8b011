//! Per-user session storage for the HTTP adapter.

use crate::models::SessionState;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One `SessionState` per user, each behind its own async mutex.
///
/// Holding a user's guard for the duration of a pipeline call serialises
/// that user's requests while other users proceed in parallel. Sessions live
/// for the process lifetime; only ids admitted by the access gate create one.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Arc<Mutex<SessionState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `user_id`'s session, creating it on first use.
    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<SessionState> {
        // Clone the Arc out so the map shard is released before awaiting.
        let slot = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::default())))
            .clone();
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
