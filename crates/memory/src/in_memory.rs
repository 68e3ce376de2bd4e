//! In-memory session store: fast, ephemeral, good for tests and one-off runs.

use async_trait::async_trait;
use filescout_core::conversation::{ConversationState, SessionId};
use filescout_core::error::StoreError;
use filescout_core::store::SessionStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A simple in-memory store keyed by session id.
///
/// States are cloned in and out, so callers never share a live reference.
pub struct InMemoryStore {
    sessions: Arc<RwLock<BTreeMap<SessionId, ConversationState>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, id: &SessionId, state: &ConversationState) -> Result<(), StoreError> {
        self.sessions.write().await.insert(id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
