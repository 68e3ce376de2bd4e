//! Session manager: the entry point front ends talk to.
//!
//! Loads a session's state from the store, runs the control loop, and
//! checkpoints the result. Runs for one session are serialised by a
//! per-session lock; different sessions proceed concurrently.

use crate::control_loop::{ControlLoop, LoopOutcome};
use filescout_core::conversation::{ConversationState, SessionId};
use filescout_core::error::Result;
use filescout_core::message::Turn;
use filescout_core::store::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    control: Arc<ControlLoop>,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, control: Arc<ControlLoop>) -> Self {
        Self {
            store,
            control,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    /// The lock serialising runs of `id`.
    ///
    /// Entries only the map still references are dropped on the way in, so
    /// the map holds at most the sessions with a run in flight plus `id`.
    async fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start `id` with an empty state, replacing anything stored under it.
    pub async fn start_session(&self, id: &SessionId) -> Result<ConversationState> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let state = ConversationState::new(id.clone());
        self.store.save(id, &state).await?;
        info!(session = %id, "Session started");
        Ok(state)
    }

    /// Resume `id` if the store knows it, otherwise start it.
    pub async fn open_session(&self, id: &SessionId) -> Result<ConversationState> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        if let Some(state) = self.store.load(id).await? {
            debug!(session = %id, turns = state.len(), "Session resumed");
            return Ok(state);
        }
        let state = ConversationState::new(id.clone());
        self.store.save(id, &state).await?;
        info!(session = %id, "Session started");
        Ok(state)
    }

    /// Append a user turn and run the loop to the next pause.
    ///
    /// The outcome's `new_turns` starts with the user turn.
    pub async fn post(&self, id: &SessionId, text: &str) -> Result<LoopOutcome> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut state = match self.store.load(id).await? {
            Some(state) => state,
            None => ConversationState::new(id.clone()),
        };

        let user = Turn::user(text);
        state.append(user.clone())?;

        let mut outcome = self.control.run(&mut state).await;
        self.store.save(id, &state).await?;

        outcome.new_turns.insert(0, user);
        Ok(outcome)
    }

    /// Append a user turn and return every turn produced up to the next pause.
    pub async fn post_user_turn(&self, id: &SessionId, text: &str) -> Result<Vec<Turn>> {
        Ok(self.post(id, text).await?.new_turns)
    }

    /// Ordered turns of a session; empty for an unknown session.
    pub async fn get_history(&self, id: &SessionId) -> Result<Vec<Turn>> {
        Ok(self
            .get_state(id)
            .await?
            .map(|s| s.turns().to_vec())
            .unwrap_or_default())
    }

    pub async fn get_state(&self, id: &SessionId) -> Result<Option<ConversationState>> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        Ok(self.store.load(id).await?)
    }

    /// Clear a session's history, keeping the id usable.
    pub async fn reset_session(&self, id: &SessionId) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut state = self
            .store
            .load(id)
            .await?
            .unwrap_or_else(|| ConversationState::new(id.clone()));
        state.reset();
        self.store.save(id, &state).await?;
        info!(session = %id, "Session reset");
        Ok(())
    }

    /// Remove a session entirely. Returns whether it existed.
    pub async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        let existed = self.store.delete(id).await?;
        info!(session = %id, existed, "Session deleted");
        Ok(existed)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        Ok(self.store.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_loop::StopReason;
    use crate::executor::ActionExecutor;
    use crate::decision::{DeciderSettings, ModelDecider};
    use crate::test_helpers::{
        EchoDecider, ScriptedDecider, SequentialMockProvider, decision_json, make_text_response,
    };
    use filescout_core::error::ProviderError;
    use filescout_core::provider::ProviderResponse;
    use filescout_core::tool::ToolCall;
    use filescout_core::decision::DecisionResult;
    use filescout_core::event::EventBus;
    use filescout_core::message::Role;
    use filescout_core::tool::ToolRegistry;
    use filescout_memory::{FileStore, InMemoryStore};
    use std::time::Duration;

    fn manager_with(decider: Arc<dyn crate::Decider>, store: Arc<dyn SessionStore>) -> SessionManager {
        let control = ControlLoop::new(
            decider,
            ActionExecutor::new(Arc::new(ToolRegistry::new()), Duration::from_secs(5)),
            10,
            Arc::new(EventBus::default()),
        );
        SessionManager::new(store, Arc::new(control))
    }

    fn echo_manager() -> SessionManager {
        manager_with(Arc::new(EchoDecider), Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn start_session_is_empty() {
        let manager = echo_manager();
        let id = SessionId::from("t1");
        let state = manager.start_session(&id).await.unwrap();
        assert!(state.is_empty());
        assert!(manager.get_history(&id).await.unwrap().is_empty());
        assert_eq!(manager.list_sessions().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn post_returns_user_turn_and_reply() {
        let manager = echo_manager();
        let id = SessionId::from("t1");
        let turns = manager.post_user_turn(&id, "hello").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let manager = echo_manager();
        let id = SessionId::from("t1");
        manager.post_user_turn(&id, "first").await.unwrap();
        let before = manager.get_history(&id).await.unwrap();

        manager.post_user_turn(&id, "second").await.unwrap();
        let after = manager.get_history(&id).await.unwrap();

        assert_eq!(after.len(), 4);
        assert_eq!(&after[..2], &before[..]);
        assert_eq!(after[2].content, "second");
    }

    #[tokio::test]
    async fn sessions_are_isolated_across_reset() {
        let manager = Arc::new(echo_manager());
        let a = SessionId::from("a");
        let b = SessionId::from("b");

        let (ra, rb) = tokio::join!(
            manager.post_user_turn(&a, "alpha"),
            manager.post_user_turn(&b, "beta"),
        );
        ra.unwrap();
        rb.unwrap();

        manager.reset_session(&a).await.unwrap();
        assert!(manager.get_history(&a).await.unwrap().is_empty());
        let b_history = manager.get_history(&b).await.unwrap();
        assert_eq!(b_history.len(), 2);
        assert!(b_history.iter().all(|t| !t.content.contains("alpha")));

        manager.post_user_turn(&a, "again").await.unwrap();
        manager.reset_session(&b).await.unwrap();
        let a_history = manager.get_history(&a).await.unwrap();
        assert_eq!(a_history.len(), 2);
        assert!(a_history.iter().all(|t| !t.content.contains("beta")));
        assert!(manager.get_history(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_posts_to_one_session_are_serialised() {
        let manager = Arc::new(echo_manager());
        let id = SessionId::from("shared");

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let manager = manager.clone();
                let id = id.clone();
                tokio::spawn(async move { manager.post_user_turn(&id, &format!("msg {i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = manager.get_history(&id).await.unwrap();
        assert_eq!(history.len(), 10);
        // Every user turn is immediately followed by its own echo
        for pair in history.chunks(2) {
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
    }

    #[tokio::test]
    async fn ask_user_round_trip_keeps_context() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            DecisionResult::ask_user("Which directory?"),
            DecisionResult::respond("src has 4 files."),
        ]));
        let manager = manager_with(decider, Arc::new(InMemoryStore::new()));
        let id = SessionId::from("t");

        let first = manager.post(&id, "count files").await.unwrap();
        assert_eq!(first.stop, StopReason::AskedUser);
        let second = manager.post(&id, "src").await.unwrap();
        assert_eq!(second.stop, StopReason::Responded);

        let history = manager.get_history(&id).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["count files", "Which directory?", "src", "src has 4 files."]);
    }

    #[tokio::test]
    async fn file_store_checkpoints_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::from("persisted");

        let manager = manager_with(Arc::new(EchoDecider), Arc::new(FileStore::new(dir.path())));
        manager.post_user_turn(&id, "remember me").await.unwrap();
        drop(manager);

        let manager = manager_with(Arc::new(EchoDecider), Arc::new(FileStore::new(dir.path())));
        let state = manager.open_session(&id).await.unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.turns()[0].content, "remember me");
    }

    #[tokio::test]
    async fn start_session_replaces_existing_state() {
        let manager = echo_manager();
        let id = SessionId::from("t");
        manager.post_user_turn(&id, "old").await.unwrap();
        manager.start_session(&id).await.unwrap();
        assert!(manager.get_history(&id).await.unwrap().is_empty());
        assert!(manager.delete_session(&id).await.unwrap());
        assert!(manager.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_the_lock_other_callers_wait_on() {
        let manager = echo_manager();
        let id = SessionId::from("t");
        manager.post_user_turn(&id, "hello").await.unwrap();

        let waiting = manager.lock_for(&id).await;
        assert!(manager.delete_session(&id).await.unwrap());
        let next = manager.lock_for(&id).await;
        assert!(Arc::ptr_eq(&waiting, &next));
    }

    #[tokio::test]
    async fn idle_session_locks_are_pruned() {
        let manager = echo_manager();
        for i in 0..20 {
            let id = SessionId::from(format!("s{i}").as_str());
            manager.post_user_turn(&id, "hi").await.unwrap();
        }
        assert_eq!(manager.locks.lock().await.len(), 1);

        let held = manager.lock_for(&SessionId::from("s3")).await;
        manager.post_user_turn(&SessionId::from("s4"), "hi").await.unwrap();
        let locks = manager.locks.lock().await;
        assert_eq!(locks.len(), 2);
        assert!(Arc::ptr_eq(&held, &locks[&SessionId::from("s3")]));
    }

    fn model_manager(
        responses: Vec<std::result::Result<ProviderResponse, ProviderError>>,
        dir: &std::path::Path,
    ) -> (SessionManager, Arc<SequentialMockProvider>) {
        let provider = Arc::new(SequentialMockProvider::new(responses));
        let tools = Arc::new(filescout_tools::registry_with_policy(
            filescout_tools::PathPolicy::new(dir),
            4000,
        ));
        let events = Arc::new(EventBus::default());
        let decider = ModelDecider::new(
            provider.clone(),
            tools.clone(),
            DeciderSettings::default(),
            events.clone(),
        );
        let control = ControlLoop::new(
            Arc::new(decider),
            ActionExecutor::new(tools, Duration::from_secs(5)),
            10,
            events,
        );
        let manager = SessionManager::new(Arc::new(InMemoryStore::new()), Arc::new(control));
        (manager, provider)
    }

    fn native_call_with_id(id: &str) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut call = ToolCall::new("list_directory", serde_json::json!({}));
        call.id = id.to_string();
        let mut response = make_text_response("");
        response.message.tool_call = Some(call);
        Ok(response)
    }

    #[tokio::test]
    async fn native_calls_sharing_an_id_are_answered_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = model_manager(
            vec![
                native_call_with_id("call_0"),
                native_call_with_id("call_0"),
                Ok(make_text_response(&decision_json(
                    "respond",
                    serde_json::json!({"answer": "Two listings."}),
                ))),
            ],
            dir.path(),
        );
        let id = SessionId::from("native");

        let turns = manager.post_user_turn(&id, "list it twice").await.unwrap();
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[5].content, "Two listings.");
        assert!(turns.iter().filter(|t| t.role == Role::Tool).all(|t| !t.is_error()));
        assert_eq!(manager.get_history(&id).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn every_decision_sees_the_latest_user_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut responses: Vec<_> = (0..7)
            .map(|_| {
                Ok(make_text_response(&decision_json(
                    "use_tool",
                    serde_json::json!({"tool_name": "list_directory", "tool_args": "{}"}),
                )))
            })
            .collect();
        responses.push(Ok(make_text_response(&decision_json(
            "respond",
            serde_json::json!({"answer": "Done looking."}),
        ))));
        let (manager, provider) = model_manager(responses, dir.path());
        let id = SessionId::from("window");

        manager.post_user_turn(&id, "list everything").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 8);
        for (i, request) in requests.iter().enumerate() {
            assert!(
                request
                    .messages
                    .iter()
                    .any(|m| m.role == Role::User && m.content == "list everything"),
                "decision {} lost the user turn",
                i + 1
            );
        }
    }
}
