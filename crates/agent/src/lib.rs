//! The agentic control loop, the heart of FileScout.
//!
//! The agent follows a **Decide → Act → Observe** cycle:
//!
//! 1. **Receive** a user turn through the [`SessionManager`]
//! 2. **Decide** with one model call: use a tool, ask the user, or respond
//! 3. **If use_tool**: run exactly one tool, append its result, decide again
//! 4. **If ask_user / respond**: append the assistant turn and pause
//!
//! The loop stops at the first pause, or when the iteration budget is spent.

pub mod control_loop;
pub mod decision;
pub mod executor;
pub mod prompt;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use control_loop::{ControlLoop, LoopOutcome, LoopState, StopReason};
pub use decision::{Decider, DeciderSettings, ModelDecider, parse_decision};
pub use executor::ActionExecutor;
pub use session::SessionManager;

use filescout_config::AppConfig;
use filescout_core::event::EventBus;
use filescout_core::provider::Provider;
use filescout_core::store::SessionStore;
use filescout_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Wire the model decider, executor, and control loop into a session
/// manager. The provider, registry, and store are shared, never copied.
pub fn build_session_manager(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
) -> SessionManager {
    let decider = ModelDecider::new(
        provider,
        tools.clone(),
        DeciderSettings::from_config(config),
        events.clone(),
    );
    let executor = ActionExecutor::new(
        tools,
        Duration::from_secs(config.agent.tool_timeout_secs),
    );
    let control = ControlLoop::new(
        Arc::new(decider),
        executor,
        config.agent.max_iterations,
        events,
    );
    SessionManager::new(store, Arc::new(control))
}
