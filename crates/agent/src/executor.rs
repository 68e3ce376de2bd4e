//! Action executor: runs the tool a decision selected.
//!
//! Whatever happens inside the tool (an error, a timeout, a panic) comes
//! back as a tool turn answering the original call id. Nothing escapes.

use filescout_core::error::{ToolError, ToolFailure};
use filescout_core::message::Turn;
use filescout_core::tool::{ToolCall, ToolRegistry};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ActionExecutor {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(tools: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { tools, timeout }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run `call` and return the tool turn that answers it.
    pub async fn execute(&self, call: &ToolCall) -> Turn {
        let tool = match self.tools.resolve(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                return Turn::tool_error(
                    &call.id,
                    e.failure(),
                    format!(
                        "Error: unknown tool '{}'. Available tools: {}",
                        call.name,
                        self.tools.names().join(", ")
                    ),
                );
            }
        };

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");

        let run = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(Ok(result))) => Turn::from_tool_result(&call.id, result),
            Ok(Ok(Err(e))) => {
                warn!(tool = %call.name, error = %e, "Tool returned an error");
                Turn::tool_error(&call.id, e.failure(), format!("Error: {e}"))
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = %call.name, panic = %message, "Tool panicked");
                Turn::tool_error(
                    &call.id,
                    ToolFailure::ExecutionFailed,
                    format!("Error: tool '{}' crashed: {message}", call.name),
                )
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                warn!(tool = %call.name, "Tool timed out");
                Turn::tool_error(&call.id, e.failure(), format!("Error: {e}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filescout_core::message::Role;
    use filescout_core::tool::{Tool, ToolResult};

    struct BehaviourTool {
        name: &'static str,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Echo,
        Fail,
        Panic,
        Hang,
    }

    #[async_trait]
    impl Tool for BehaviourTool {
        fn name(&self) -> &str { self.name }
        fn description(&self) -> &str { "test tool" }
        fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({"type": "object"}) }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            match self.behaviour {
                Behaviour::Echo => Ok(ToolResult::ok(arguments.to_string())),
                Behaviour::Fail => Err(ToolError::InvalidArguments("path must be a string".into())),
                Behaviour::Panic => panic!("index out of bounds"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ToolResult::ok("late"))
                }
            }
        }
    }

    fn executor() -> ActionExecutor {
        let mut registry = ToolRegistry::new();
        for (name, behaviour) in [
            ("echo", Behaviour::Echo),
            ("fail", Behaviour::Fail),
            ("panic", Behaviour::Panic),
            ("hang", Behaviour::Hang),
        ] {
            registry.register(Box::new(BehaviourTool { name, behaviour }));
        }
        ActionExecutor::new(Arc::new(registry), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn success_answers_call_id() {
        let call = ToolCall::new("echo", serde_json::json!({"path": "."}));
        let turn = executor().execute(&call).await;
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some(call.id.as_str()));
        assert!(!turn.is_error());
        assert!(turn.content.contains("\"path\""));
    }

    #[tokio::test]
    async fn unknown_tool_lists_available() {
        let call = ToolCall::new("delete_everything", serde_json::json!({}));
        let turn = executor().execute(&call).await;
        assert_eq!(turn.failure, Some(ToolFailure::ToolNotFound));
        assert_eq!(turn.tool_call_id.as_deref(), Some(call.id.as_str()));
        assert!(turn.content.starts_with("Error: unknown tool 'delete_everything'"));
        assert!(turn.content.contains("echo, fail, hang, panic"));
    }

    #[tokio::test]
    async fn tool_error_becomes_error_turn() {
        let turn = executor().execute(&ToolCall::new("fail", serde_json::json!({}))).await;
        assert_eq!(turn.failure, Some(ToolFailure::InvalidArguments));
        assert!(turn.content.contains("path must be a string"));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let turn = executor().execute(&ToolCall::new("panic", serde_json::json!({}))).await;
        assert_eq!(turn.failure, Some(ToolFailure::ExecutionFailed));
        assert!(turn.content.contains("crashed: index out of bounds"));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_tool_times_out() {
        let call = ToolCall::new("hang", serde_json::json!({}));
        let turn = executor().execute(&call).await;
        assert_eq!(turn.failure, Some(ToolFailure::Timeout));
        assert_eq!(turn.tool_call_id.as_deref(), Some(call.id.as_str()));
        assert!(turn.content.contains("after 2s"));
    }
}
