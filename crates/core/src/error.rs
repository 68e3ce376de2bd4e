//! Error types for the FileScout domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them with `#[from]` conversions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all FileScout operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Session store errors ---
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    // --- Conversation invariants ---
    #[error("Conversation state error: {0}")]
    State(#[from] StateError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// The failure kind recorded on the tool turn built from this error.
    pub fn failure(&self) -> ToolFailure {
        match self {
            Self::NotFound(_) => ToolFailure::ToolNotFound,
            Self::ExecutionFailed { .. } => ToolFailure::ExecutionFailed,
            Self::Timeout { .. } => ToolFailure::Timeout,
            Self::InvalidArguments(_) => ToolFailure::InvalidArguments,
        }
    }
}

/// Why a tool result is an error. Carried on tool turns as data, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailure {
    ToolNotFound,
    ExecutionFailed,
    InvalidArguments,
    Timeout,
    PathNotFound,
    NotAFile,
    NotADirectory,
    PermissionDenied,
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ToolNotFound => "tool_not_found",
            Self::ExecutionFailed => "execution_failed",
            Self::InvalidArguments => "invalid_arguments",
            Self::Timeout => "timeout",
            Self::PathNotFound => "path_not_found",
            Self::NotAFile => "not_a_file",
            Self::NotADirectory => "not_a_directory",
            Self::PermissionDenied => "permission_denied",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted session '{session_id}': {reason}")]
    Corrupted { session_id: String, reason: String },
}

/// Violations of the append-only conversation invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Tool turn has no tool_call_id")]
    MissingToolCallId,

    #[error("Tool result '{0}' does not answer any pending tool call")]
    OrphanToolResult(String),

    #[error("Tool call '{0}' already has a result")]
    DuplicateToolResult(String),
}

/// Why the decision step had to fall back to a diagnostic `respond`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DecisionError {
    #[error("Model returned a malformed decision: {0}")]
    DecisionMalformed(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn store_error_wraps_into_top_level() {
        let err: Error = StoreError::Corrupted {
            session_id: "s1".into(),
            reason: "bad json".into(),
        }
        .into();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn tool_error_maps_to_failure_kind() {
        assert_eq!(
            ToolError::NotFound("grep".into()).failure(),
            ToolFailure::ToolNotFound
        );
        assert_eq!(
            ToolError::Timeout {
                tool_name: "read_file_tool".into(),
                timeout_secs: 3,
            }
            .failure(),
            ToolFailure::Timeout
        );
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ToolFailure::PathNotFound).unwrap();
        assert_eq!(json, r#""path_not_found""#);
        assert_eq!(ToolFailure::NotADirectory.to_string(), "not_a_directory");
    }

    #[test]
    fn state_error_wraps_into_top_level() {
        let err: Error = StateError::OrphanToolResult("call_9".into()).into();
        assert!(err.to_string().contains("call_9"));
    }
}
