//! The decision step: one model call that picks the next action.
//!
//! [`ModelDecider`] is the only component that talks to the model. Every
//! failure (transport error, timeout, unparseable output) is folded into a
//! fallback `respond` decision, so callers never see an error.

use crate::prompt;
use async_trait::async_trait;
use filescout_config::AppConfig;
use filescout_core::conversation::ConversationState;
use filescout_core::decision::{DecisionResult, NextAction, apology};
use filescout_core::error::DecisionError;
use filescout_core::event::{DomainEvent, EventBus};
use filescout_core::message::Turn;
use filescout_core::provider::{Provider, ProviderRequest, ResponseFormat, ToolChoice};
use filescout_core::tool::{ToolCall, ToolRegistry};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Chooses the next action for a conversation.
#[async_trait]
pub trait Decider: Send + Sync {
    /// Decide what to do next. Never fails: problems become a fallback
    /// `respond` decision.
    async fn decide(&self, state: &ConversationState) -> DecisionResult;

    /// Compose the final answer when a `respond` decision carried none.
    async fn compose_answer(&self, state: &ConversationState) -> String;
}

/// Settings for [`ModelDecider`].
#[derive(Debug, Clone)]
pub struct DeciderSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub history_window: usize,
    pub timeout: Duration,
    pub persona: Option<String>,
}

impl DeciderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            history_window: config.agent.history_window,
            timeout: Duration::from_secs(config.agent.model_timeout_secs),
            persona: config.agent.system_prompt.clone(),
        }
    }
}

impl Default for DeciderSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A decider backed by a chat-completions provider with structured output.
pub struct ModelDecider {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: DeciderSettings,
    events: Arc<EventBus>,
}

impl ModelDecider {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        settings: DeciderSettings,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
            events,
        }
    }

    /// System instruction followed by the recent history window.
    fn messages(&self, state: &ConversationState, instruction: String) -> Vec<Turn> {
        let window = state.window(self.settings.history_window);
        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(Turn::system(instruction));
        messages.extend(window.iter().cloned());
        messages
    }

    fn decision_request(&self, state: &ConversationState) -> ProviderRequest {
        let instruction = prompt::decision_instruction(&self.tools, self.settings.persona.as_deref());
        let mut request = ProviderRequest::new(&self.settings.model, self.messages(state, instruction));
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        // Tools are advertised so replayed tool turns are accepted, but the
        // model must answer through the schema rather than call them natively
        request.tools = self.tools.definitions();
        request.tool_choice = Some(ToolChoice::None);
        request.response_format = Some(ResponseFormat::JsonSchema {
            name: prompt::DECISION_SCHEMA_NAME.into(),
            schema: prompt::decision_schema(),
            strict: true,
        });
        request
    }

    fn answer_request(&self, state: &ConversationState) -> ProviderRequest {
        let instruction = prompt::answer_instruction(self.settings.persona.as_deref());
        let mut request = ProviderRequest::new(&self.settings.model, self.messages(state, instruction));
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request.tools = self.tools.definitions();
        request.tool_choice = Some(ToolChoice::None);
        request.stream = true;
        request
    }

    async fn try_decide(&self, state: &ConversationState) -> Result<DecisionResult, DecisionError> {
        let request = self.decision_request(state);
        let timeout_secs = self.settings.timeout.as_secs();

        let response = tokio::time::timeout(self.settings.timeout, self.provider.complete(request))
            .await
            .map_err(|_| DecisionError::Timeout(timeout_secs))?
            .map_err(|e| DecisionError::ModelUnavailable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                session = %state.session_id,
                model = %response.model,
                tokens = usage.total_tokens,
                "Decision call completed"
            );
        }

        // Some endpoints ignore tool_choice=none; accept a native call, but
        // under an id of our own since endpoints may reuse theirs across steps
        if let Some(call) = response.message.tool_call {
            let call = ToolCall::new(call.name, call.arguments);
            return Ok(DecisionResult::use_tool(call).with_thinking(response.message.content, ""));
        }

        parse_decision(&response.message.content)
    }

    async fn try_compose(&self, state: &ConversationState) -> Result<String, DecisionError> {
        let request = self.answer_request(state);
        let session_id = state.session_id.to_string();
        let mut answer = String::new();

        let streamed = tokio::time::timeout(self.settings.timeout, async {
            let mut rx = self.provider.stream(request).await?;
            while let Some(chunk) = rx.recv().await {
                let chunk = chunk?;
                if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                    self.events.publish(DomainEvent::AnswerChunk {
                        session_id: session_id.clone(),
                        content: content.clone(),
                    });
                    answer.push_str(&content);
                }
                if chunk.done {
                    break;
                }
            }
            Ok::<(), filescout_core::error::ProviderError>(())
        })
        .await;

        match streamed {
            Err(_) if answer.is_empty() => Err(DecisionError::Timeout(self.settings.timeout.as_secs())),
            Ok(Err(e)) if answer.is_empty() => Err(DecisionError::ModelUnavailable(e.to_string())),
            Err(_) | Ok(Err(_)) => {
                warn!(session = %session_id, "Answer stream cut short, keeping partial answer");
                Ok(answer)
            }
            Ok(Ok(())) if answer.trim().is_empty() => Err(DecisionError::ModelUnavailable(
                "the model returned an empty answer".into(),
            )),
            Ok(Ok(())) => Ok(answer),
        }
    }

    fn report(&self, context: &str, error: &DecisionError) {
        warn!(error = %error, "{context}");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

#[async_trait]
impl Decider for ModelDecider {
    async fn decide(&self, state: &ConversationState) -> DecisionResult {
        match self.try_decide(state).await {
            Ok(decision) => decision,
            Err(e) => {
                self.report("decision step failed", &e);
                DecisionResult::fallback(e)
            }
        }
    }

    async fn compose_answer(&self, state: &ConversationState) -> String {
        match self.try_compose(state).await {
            Ok(answer) => answer,
            Err(e) => {
                self.report("answer composition failed", &e);
                apology(&e)
            }
        }
    }
}

/// The decision fields as the model emits them.
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    plan: Option<String>,
    next_action: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_args: Option<serde_json::Value>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Normalise `tool_args` into a JSON object. Accepts an object, a
/// JSON-encoded object string, or nothing.
fn parse_tool_args(args: Option<serde_json::Value>) -> Result<serde_json::Value, DecisionError> {
    let value = match args {
        None | Some(serde_json::Value::Null) => return Ok(serde_json::json!({})),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(serde_json::json!({})),
        Some(serde_json::Value::String(s)) => serde_json::from_str(&s).map_err(|e| {
            DecisionError::DecisionMalformed(format!("tool_args is not valid JSON: {e}"))
        })?,
        Some(other) => other,
    };
    if value.is_object() {
        Ok(value)
    } else {
        Err(DecisionError::DecisionMalformed(
            "tool_args must be a JSON object".into(),
        ))
    }
}

/// Parse and validate the model's decision text.
pub fn parse_decision(text: &str) -> Result<DecisionResult, DecisionError> {
    let body = strip_code_fence(text);
    let raw: RawDecision = serde_json::from_str(body).or_else(|first_err| {
        // Tolerate prose around the object
        match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
                .map_err(|_| DecisionError::DecisionMalformed(first_err.to_string())),
            _ => Err(DecisionError::DecisionMalformed(first_err.to_string())),
        }
    })?;

    let next_action = match raw.next_action.trim().to_ascii_lowercase().as_str() {
        "use_tool" => {
            let name = non_empty(raw.tool_name).ok_or_else(|| {
                DecisionError::DecisionMalformed("use_tool requires a tool_name".into())
            })?;
            NextAction::UseTool {
                call: ToolCall::new(name, parse_tool_args(raw.tool_args)?),
            }
        }
        "ask_user" => NextAction::AskUser {
            question: non_empty(raw.question).ok_or_else(|| {
                DecisionError::DecisionMalformed("ask_user requires a question".into())
            })?,
        },
        "respond" => NextAction::Respond {
            answer: non_empty(raw.answer),
        },
        other => {
            return Err(DecisionError::DecisionMalformed(format!(
                "unknown next_action '{other}'"
            )));
        }
    };

    Ok(DecisionResult::new(next_action)
        .with_thinking(raw.thinking.unwrap_or_default(), raw.plan.unwrap_or_default()))
}
