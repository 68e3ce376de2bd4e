//! Shared test doubles for the decision step and the model.

use crate::decision::Decider;
use async_trait::async_trait;
use filescout_core::conversation::ConversationState;
use filescout_core::decision::DecisionResult;
use filescout_core::error::ProviderError;
use filescout_core::message::{Role, Turn};
use filescout_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use filescout_core::tool::ToolCall;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A decider that replays scripted decisions in order.
///
/// Once the script is exhausted it responds with "done".
pub struct ScriptedDecider {
    decisions: Mutex<VecDeque<DecisionResult>>,
    answer: String,
    decide_calls: AtomicUsize,
    compose_calls: AtomicUsize,
}

impl ScriptedDecider {
    pub fn new(decisions: Vec<DecisionResult>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            answer: "composed".into(),
            decide_calls: AtomicUsize::new(0),
            compose_calls: AtomicUsize::new(0),
        }
    }

    /// Text returned by `compose_answer`.
    pub fn with_answer(mut self, answer: &str) -> Self {
        self.answer = answer.to_string();
        self
    }

    pub fn decide_calls(&self) -> usize {
        self.decide_calls.load(Ordering::SeqCst)
    }

    pub fn compose_calls(&self) -> usize {
        self.compose_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    async fn decide(&self, _state: &ConversationState) -> DecisionResult {
        self.decide_calls.fetch_add(1, Ordering::SeqCst);
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DecisionResult::respond("done"))
    }

    async fn compose_answer(&self, _state: &ConversationState) -> String {
        self.compose_calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// A decider that always wants the same tool.
pub struct AlwaysToolDecider {
    tool: String,
    calls: AtomicUsize,
}

impl AlwaysToolDecider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decider for AlwaysToolDecider {
    async fn decide(&self, _state: &ConversationState) -> DecisionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DecisionResult::use_tool(ToolCall::new(&self.tool, serde_json::json!({})))
    }

    async fn compose_answer(&self, _state: &ConversationState) -> String {
        unreachable!("AlwaysToolDecider never responds on its own")
    }
}

/// A decider that answers with the last user turn, prefixed by "echo: ".
pub struct EchoDecider;

#[async_trait]
impl Decider for EchoDecider {
    async fn decide(&self, state: &ConversationState) -> DecisionResult {
        let last_user = state
            .turns()
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        // Yield so concurrent sessions interleave
        tokio::task::yield_now().await;
        DecisionResult::respond(format!("echo: {last_user}"))
    }

    async fn compose_answer(&self, _state: &ConversationState) -> String {
        String::new()
    }
}

/// A mock provider that returns a sequence of scripted results and
/// records every request it receives.
///
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| panic!("SequentialMockProvider: no more responses"))
    }
}

/// Create a plain text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Turn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Build a decision JSON document the way the model emits it.
///
/// `fields` is merged over a template with every field null.
pub fn decision_json(next_action: &str, fields: serde_json::Value) -> String {
    let mut doc = serde_json::json!({
        "thinking": "mock thinking",
        "plan": "mock plan",
        "next_action": next_action,
        "tool_name": null,
        "tool_args": null,
        "question": null,
        "answer": null,
    });
    if let (Some(doc), Some(fields)) = (doc.as_object_mut(), fields.as_object()) {
        for (k, v) in fields {
            doc.insert(k.clone(), v.clone());
        }
    }
    doc.to_string()
}
