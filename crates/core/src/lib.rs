//! # FileScout Core
//!
//! Domain types, traits, and error definitions for the FileScout
//! file-analysis agent. This crate has no I/O of its own: it defines the
//! model that the provider, tool, store and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the control loop is a trait here:
//! - [`Provider`] for the chat-completions service
//! - [`Tool`] for side-effecting operations, collected in a [`ToolRegistry`]
//! - [`SessionStore`] for checkpointing conversation state
//!
//! Implementations live in their own crates and are injected, which keeps
//! the loop testable with scripted mocks.

pub mod conversation;
pub mod decision;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationState, PendingAction, SessionId};
pub use decision::{DecisionResult, NextAction};
pub use error::{DecisionError, Error, Result, StateError, StoreError, ToolError, ToolFailure};
pub use event::{DomainEvent, EventBus};
pub use message::{Role, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use store::SessionStore;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
