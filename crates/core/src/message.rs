//! Turn domain types.
//!
//! A turn is one immutable entry in a conversation: user input, an assistant
//! reply or tool request, a tool result, or a system instruction.

use crate::error::ToolFailure;
use crate::tool::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool call requested by the assistant (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,

    /// Which tool call this turn answers (tool turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set on tool turns whose content is an error report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ToolFailure>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_call: None,
            tool_call_id: None,
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create an assistant turn that requests a tool call.
    pub fn tool_request(call: ToolCall) -> Self {
        let mut turn = Self::with_role(Role::Assistant, String::new());
        turn.tool_call = Some(call);
        turn
    }

    /// Create a successful tool result turn.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut turn = Self::with_role(Role::Tool, content.into());
        turn.tool_call_id = Some(tool_call_id.into());
        turn
    }

    /// Create a tool result turn that reports an error.
    pub fn tool_error(
        tool_call_id: impl Into<String>,
        failure: ToolFailure,
        content: impl Into<String>,
    ) -> Self {
        let mut turn = Self::tool_result(tool_call_id, content);
        turn.failure = Some(failure);
        turn
    }

    /// Build a tool turn from a tool result, answering `call_id`.
    pub fn from_tool_result(call_id: &str, result: ToolResult) -> Self {
        match result.failure {
            Some(failure) => Self::tool_error(call_id, failure, result.output),
            None if !result.success => {
                Self::tool_error(call_id, ToolFailure::ExecutionFailed, result.output)
            }
            None => Self::tool_result(call_id, result.output),
        }
    }

    /// Whether this is a tool turn carrying an error.
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }
}
