//! Decision types: the output of one decision step.

use crate::conversation::PendingAction;
use crate::error::DecisionError;
use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// What the control loop should do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "next_action", rename_all = "snake_case")]
pub enum NextAction {
    /// Run exactly one tool.
    UseTool { call: ToolCall },
    /// Pause and ask the user a clarifying question.
    AskUser { question: String },
    /// Finish with a final answer. When `answer` is absent the answer is
    /// composed separately from the history.
    Respond {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
}

impl NextAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UseTool { .. } => "use_tool",
            Self::AskUser { .. } => "ask_user",
            Self::Respond { .. } => "respond",
        }
    }

    /// The scratch-field form of this action.
    pub fn to_pending(&self) -> PendingAction {
        match self {
            Self::UseTool { call } => PendingAction::UseTool { call: call.clone() },
            Self::AskUser { question } => PendingAction::AskUser {
                question: question.clone(),
            },
            Self::Respond { .. } => PendingAction::Respond,
        }
    }
}

/// The result of one decision step.
///
/// `thinking` and `plan` are diagnostic: they are shown to the user but never
/// sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub next_action: NextAction,

    #[serde(default)]
    pub thinking: String,

    #[serde(default)]
    pub plan: String,

    /// Set when the decision is a fallback produced after a model failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<DecisionError>,
}

impl DecisionResult {
    pub fn new(next_action: NextAction) -> Self {
        Self {
            next_action,
            thinking: String::new(),
            plan: String::new(),
            fallback: None,
        }
    }

    pub fn use_tool(call: ToolCall) -> Self {
        Self::new(NextAction::UseTool { call })
    }

    pub fn ask_user(question: impl Into<String>) -> Self {
        Self::new(NextAction::AskUser {
            question: question.into(),
        })
    }

    pub fn respond(answer: impl Into<String>) -> Self {
        Self::new(NextAction::Respond {
            answer: Some(answer.into()),
        })
    }

    /// A `respond` decision whose answer must be composed separately.
    pub fn respond_later() -> Self {
        Self::new(NextAction::Respond { answer: None })
    }

    /// The deterministic `respond` used when the model could not decide.
    pub fn fallback(error: DecisionError) -> Self {
        Self {
            next_action: NextAction::Respond {
                answer: Some(apology(&error)),
            },
            thinking: format!("Decision failed: {error}"),
            plan: String::new(),
            fallback: Some(error),
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>, plan: impl Into<String>) -> Self {
        self.thinking = thinking.into();
        self.plan = plan.into();
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// The user-facing message for a failed model call.
pub fn apology(error: &DecisionError) -> String {
    match error {
        DecisionError::DecisionMalformed(_) => "Sorry, I could not work out what to do next because the model returned an invalid decision. Please try rephrasing your request.".to_string(),
        DecisionError::ModelUnavailable(reason) => {
            format!("Sorry, the language model is unavailable right now ({reason}). Please try again later.")
        }
        DecisionError::Timeout(secs) => {
            format!("Sorry, the language model did not answer within {secs}s. Please try again.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_respond_with_message() {
        let decision = DecisionResult::fallback(DecisionError::Timeout(30));
        assert!(decision.is_fallback());
        match decision.next_action {
            NextAction::Respond { answer: Some(text) } => assert!(text.contains("30s")),
            other => panic!("expected respond, got {other:?}"),
        }
    }

    #[test]
    fn pending_mirrors_action() {
        let call = ToolCall::new("read_file_tool", serde_json::json!({"path": "a"}));
        let action = NextAction::UseTool { call: call.clone() };
        assert_eq!(action.to_pending(), PendingAction::UseTool { call });
        assert_eq!(NextAction::Respond { answer: None }.to_pending(), PendingAction::Respond);
    }

    #[test]
    fn action_serializes_with_tag() {
        let json = serde_json::to_value(NextAction::AskUser {
            question: "Which file?".into(),
        })
        .unwrap();
        assert_eq!(json["next_action"], "ask_user");
        assert_eq!(json["question"], "Which file?");
    }
}
