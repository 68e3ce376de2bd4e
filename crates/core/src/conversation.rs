//! Conversation state: the append-only turn log of one session plus the
//! scratch fields written by the last decision.

use crate::error::StateError;
use crate::message::{Role, Turn};
use crate::tool::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session (conversation thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the last decision asked the control loop to do next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    #[default]
    None,
    UseTool { call: ToolCall },
    AskUser { question: String },
    Respond,
}

impl PendingAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UseTool { .. } => "use_tool",
            Self::AskUser { .. } => "ask_user",
            Self::Respond => "respond",
        }
    }
}

/// The state of one conversation.
///
/// Turns can only be appended; [`ConversationState::append`] enforces that
/// every tool turn answers exactly one earlier tool request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Session this state belongs to
    pub session_id: SessionId,

    turns: Vec<Turn>,

    /// Rationale from the last decision (display only)
    #[serde(default)]
    pub thinking: String,

    /// Plan from the last decision (display only)
    #[serde(default)]
    pub plan: String,

    /// Action chosen by the last decision
    #[serde(default)]
    pub pending: PendingAction,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was appended
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create an empty state for a session.
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            turns: Vec::new(),
            thinking: String::new(),
            plan: String::new(),
            pending: PendingAction::None,
            created_at: now,
            updated_at: now,
        }
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append a turn, checking tool-result correlation.
    pub fn append(&mut self, turn: Turn) -> Result<(), StateError> {
        if turn.role == Role::Tool {
            let call_id = turn
                .tool_call_id
                .as_deref()
                .ok_or(StateError::MissingToolCallId)?;

            if !self.has_tool_call(call_id) {
                return Err(StateError::OrphanToolResult(call_id.to_string()));
            }

            let answered = self
                .turns
                .iter()
                .any(|t| t.role == Role::Tool && t.tool_call_id.as_deref() == Some(call_id));
            if answered {
                return Err(StateError::DuplicateToolResult(call_id.to_string()));
            }
        }

        if turn.role == Role::User {
            self.pending = PendingAction::None;
        }

        self.updated_at = Utc::now();
        self.turns.push(turn);
        Ok(())
    }

    /// Replace the scratch fields after a decision.
    pub fn record_decision(
        &mut self,
        thinking: impl Into<String>,
        plan: impl Into<String>,
        pending: PendingAction,
    ) {
        self.thinking = thinking.into();
        self.plan = plan.into();
        self.pending = pending;
    }

    /// The pending tool call, if the last decision chose one.
    pub fn pending_tool(&self) -> Option<&ToolCall> {
        match &self.pending {
            PendingAction::UseTool { call } => Some(call),
            _ => None,
        }
    }

    /// The most recent `max` turns, never starting on a tool turn whose
    /// request fell outside the window.
    ///
    /// The window is stretched back to the latest user turn, so the request
    /// being worked on stays visible however many tool steps follow it.
    pub fn window(&self, max: usize) -> &[Turn] {
        let mut start = self.turns.len().saturating_sub(max);
        if let Some(last_user) = self.turns.iter().rposition(|t| t.role == Role::User) {
            start = start.min(last_user);
        }
        let mut window = &self.turns[start..];
        while window.first().is_some_and(|t| t.role == Role::Tool) {
            window = &window[1..];
        }
        window
    }

    /// Whether an assistant turn already requested a call with this id.
    pub fn has_tool_call(&self, call_id: &str) -> bool {
        self.turns.iter().any(|t| {
            t.role == Role::Assistant && t.tool_call.as_ref().is_some_and(|c| c.id == call_id)
        })
    }

    /// Drop all turns and scratch fields, keeping the session id.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.thinking.clear();
        self.plan.clear();
        self.pending = PendingAction::None;
        self.updated_at = Utc::now();
    }
}
