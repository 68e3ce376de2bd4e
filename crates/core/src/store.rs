//! Session store trait: checkpoint persistence keyed by session id.
//!
//! The control loop never holds state between calls; the session manager
//! loads a session's state, runs the loop, and saves it back.

use crate::conversation::{ConversationState, SessionId};
use crate::error::StoreError;
use async_trait::async_trait;

/// The core SessionStore trait.
///
/// Implementations: in-memory (default, ephemeral), JSON files on disk.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Save (create or overwrite) a session's state.
    async fn save(&self, id: &SessionId, state: &ConversationState) -> Result<(), StoreError>;

    /// Load a session's state, `None` if the session is unknown.
    async fn load(&self, id: &SessionId) -> Result<Option<ConversationState>, StoreError>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;

    /// List known session ids, sorted.
    async fn list(&self) -> Result<Vec<SessionId>, StoreError>;
}
