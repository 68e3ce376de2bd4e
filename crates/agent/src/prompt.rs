//! System instructions and the decision output schema.

use filescout_core::tool::ToolRegistry;

/// Name under which the decision schema is sent to the model.
pub const DECISION_SCHEMA_NAME: &str = "filescout_decision";

const DEFAULT_PERSONA: &str = "You are a professional file-analyzing assistant.";

/// Build the instruction for the decision step.
///
/// `persona` replaces the opening line when configured; the tool list and
/// the decision contract are always appended.
pub fn decision_instruction(tools: &ToolRegistry, persona: Option<&str>) -> String {
    let mut prompt = String::from(persona.unwrap_or(DEFAULT_PERSONA).trim());
    prompt.push_str("\n\nYou have access to these tools:\n");
    for tool in tools.list() {
        prompt.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            tool.name(),
            tool.description(),
            tool.parameters_schema()
        ));
    }

    prompt.push_str(
        r#"
Analyze the user's request, think about what you need, make a plan, and decide what to do next.
Reply with a single JSON object with these fields:
- "thinking": your reasoning (shown to the user, never fed back to you)
- "plan": the remaining steps
- "next_action": one of "use_tool", "ask_user", "respond"
- "tool_name": the tool to run when next_action is "use_tool", otherwise null
- "tool_args": the tool arguments as a JSON-encoded object string, e.g. "{\"path\": \".\"}", otherwise null
- "question": the clarifying question when next_action is "ask_user", otherwise null
- "answer": the final answer for the user when next_action is "respond", otherwise null

Rules:
- Request exactly one tool per step. You will see its result before deciding again.
- Only ask the user when the request is genuinely ambiguous.
- Respond once the tool results contain what the user needs. Do not repeat your thinking or plan in the answer.
- If a tool reports an error, decide whether another call can recover or explain the problem to the user."#,
    );
    prompt
}

/// Instruction for composing a final answer from the history.
pub fn answer_instruction(persona: Option<&str>) -> String {
    format!(
        "{} Based on the conversation history and any tool results, provide a clear and helpful answer to the user.\n\n\
         Do NOT repeat your thinking process or plan in the response. Just provide the answer directly.",
        persona.unwrap_or(DEFAULT_PERSONA).trim()
    )
}

/// JSON Schema for a decision, usable with strict structured output.
///
/// Strict mode requires every property to be listed as required and every
/// object to be closed, so optional fields are nullable and `tool_args` is
/// carried as a JSON-encoded string.
pub fn decision_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "thinking": { "type": "string" },
            "plan": { "type": "string" },
            "next_action": {
                "type": "string",
                "enum": ["use_tool", "ask_user", "respond"]
            },
            "tool_name": { "type": ["string", "null"] },
            "tool_args": { "type": ["string", "null"] },
            "question": { "type": ["string", "null"] },
            "answer": { "type": ["string", "null"] }
        },
        "required": ["thinking", "plan", "next_action", "tool_name", "tool_args", "question", "answer"],
        "additionalProperties": false
    })
}
