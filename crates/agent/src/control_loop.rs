//! The control loop: a small state machine over one conversation.
//!
//! ```text
//! Deciding ──use_tool──▶ Acting ──tool turn──▶ Deciding
//!    │ ask_user
//!    ├────────▶ Asking ─────▶ Terminal
//!    │ respond / budget spent
//!    └────────▶ Responding ─▶ Terminal
//! ```
//!
//! Each run starts in `Deciding` after a user turn has been appended and
//! stops at the next pause: a question for the user or a final answer.

use crate::decision::Decider;
use crate::executor::ActionExecutor;
use chrono::Utc;
use filescout_core::conversation::{ConversationState, PendingAction};
use filescout_core::decision::NextAction;
use filescout_core::error::StateError;
use filescout_core::event::{DomainEvent, EventBus};
use filescout_core::message::Turn;
use filescout_core::tool::ToolCall;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the loop currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Deciding,
    Acting(ToolCall),
    Asking(String),
    Responding(Option<String>),
    Terminal,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A final answer was produced
    Responded,
    /// The loop paused to ask the user a question
    AskedUser,
    /// The iteration budget ran out while the model still wanted tools
    BudgetExceeded,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Responded => "responded",
            Self::AskedUser => "asked_user",
            Self::BudgetExceeded => "budget_exceeded",
        }
    }
}

/// The result of one run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Turns appended during the run, oldest first
    pub new_turns: Vec<Turn>,
    pub stop: StopReason,
    /// Decisions taken
    pub iterations: u32,
}

impl LoopOutcome {
    /// The content of the closing assistant turn.
    pub fn reply(&self) -> Option<&str> {
        self.new_turns.last().map(|t| t.content.as_str())
    }
}

pub struct ControlLoop {
    decider: Arc<dyn Decider>,
    executor: ActionExecutor,
    max_iterations: u32,
    events: Arc<EventBus>,
}

impl ControlLoop {
    pub fn new(
        decider: Arc<dyn Decider>,
        executor: ActionExecutor,
        max_iterations: u32,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            decider,
            executor,
            max_iterations: max_iterations.max(1),
            events,
        }
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn budget_message(&self) -> String {
        format!(
            "I could not complete this request within the iteration budget ({} steps). \
             Please narrow the request or ask me to continue.",
            self.max_iterations
        )
    }

    /// Run from `Deciding` until the next pause.
    ///
    /// Never fails: a turn the conversation rejects ends the run with an
    /// apology instead.
    pub async fn run(&self, state: &mut ConversationState) -> LoopOutcome {
        let session_id = state.session_id.to_string();
        let mut new_turns = Vec::new();
        let mut iterations = 0u32;
        let mut stop = StopReason::Responded;
        let mut current = LoopState::Deciding;

        info!(session = %session_id, turns = state.len(), "Control loop started");

        loop {
            current = match current {
                LoopState::Deciding => {
                    let decision = self.decider.decide(state).await;
                    iterations += 1;

                    debug!(
                        session = %session_id,
                        iteration = iterations,
                        action = decision.next_action.label(),
                        fallback = decision.is_fallback(),
                        "Decision made"
                    );
                    self.events.publish(DomainEvent::DecisionMade {
                        session_id: session_id.clone(),
                        action: decision.next_action.label().to_string(),
                        thinking: decision.thinking.clone(),
                        plan: decision.plan.clone(),
                        fallback: decision.is_fallback(),
                        timestamp: Utc::now(),
                    });

                    let pending = decision.next_action.to_pending();
                    match decision.next_action {
                        NextAction::UseTool { .. } if iterations >= self.max_iterations => {
                            warn!(
                                session = %session_id,
                                iterations,
                                "Iteration budget spent, forcing a response"
                            );
                            state.record_decision(decision.thinking, decision.plan, PendingAction::Respond);
                            stop = StopReason::BudgetExceeded;
                            LoopState::Responding(Some(self.budget_message()))
                        }
                        NextAction::UseTool { call } => {
                            state.record_decision(decision.thinking, decision.plan, pending);
                            LoopState::Acting(call)
                        }
                        NextAction::AskUser { question } => {
                            state.record_decision(decision.thinking, decision.plan, pending);
                            LoopState::Asking(question)
                        }
                        NextAction::Respond { answer } => {
                            state.record_decision(decision.thinking, decision.plan, pending);
                            LoopState::Responding(answer)
                        }
                    }
                }

                LoopState::Acting(call) => {
                    let call = if state.has_tool_call(&call.id) {
                        warn!(session = %session_id, call_id = %call.id, "Tool call id reused, issuing a fresh one");
                        let fresh = ToolCall::new(call.name, call.arguments);
                        state.pending = PendingAction::UseTool { call: fresh.clone() };
                        fresh
                    } else {
                        call
                    };

                    match self.act(state, &session_id, call, &mut new_turns).await {
                        // Re-decide after every tool result, failed or not
                        Ok(()) => LoopState::Deciding,
                        Err(e) => {
                            warn!(session = %session_id, error = %e, "Tool turn rejected, answering instead");
                            self.events.publish(DomainEvent::ErrorOccurred {
                                context: "control_loop".into(),
                                error_message: e.to_string(),
                                timestamp: Utc::now(),
                            });
                            LoopState::Responding(Some(format!(
                                "Sorry, I could not record a tool result ({e}). Please try again."
                            )))
                        }
                    }
                }

                LoopState::Asking(question) => {
                    Self::append_reply(state, Turn::assistant(question), &mut new_turns);
                    stop = StopReason::AskedUser;
                    LoopState::Terminal
                }

                LoopState::Responding(answer) => {
                    let text = match answer {
                        Some(text) => text,
                        None => self.decider.compose_answer(state).await,
                    };
                    Self::append_reply(state, Turn::assistant(text), &mut new_turns);
                    LoopState::Terminal
                }

                LoopState::Terminal => break,
            };
        }

        info!(
            session = %session_id,
            iterations,
            stop = stop.label(),
            new_turns = new_turns.len(),
            "Control loop finished"
        );
        self.events.publish(DomainEvent::LoopFinished {
            session_id,
            stop: stop.label().to_string(),
            iterations,
            timestamp: Utc::now(),
        });

        LoopOutcome {
            new_turns,
            stop,
            iterations,
        }
    }

    /// Append the tool request, run it, and append its result.
    async fn act(
        &self,
        state: &mut ConversationState,
        session_id: &str,
        call: ToolCall,
        new_turns: &mut Vec<Turn>,
    ) -> Result<(), StateError> {
        self.events.publish(DomainEvent::ToolStarted {
            session_id: session_id.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            timestamp: Utc::now(),
        });

        let request = Turn::tool_request(call.clone());
        state.append(request.clone())?;
        new_turns.push(request);

        let started = Instant::now();
        let result = self.executor.execute(&call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.events.publish(DomainEvent::ToolExecuted {
            session_id: session_id.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: !result.is_error(),
            duration_ms,
            timestamp: Utc::now(),
        });

        state.append(result.clone())?;
        new_turns.push(result);
        Ok(())
    }

    /// Assistant text turns carry no tool correlation, so `append` accepts them.
    fn append_reply(state: &mut ConversationState, turn: Turn, new_turns: &mut Vec<Turn>) {
        match state.append(turn.clone()) {
            Ok(()) => new_turns.push(turn),
            Err(e) => warn!(session = %state.session_id, error = %e, "Assistant turn rejected"),
        }
    }
}
