//! # Worksmith Core
//!
//! Domain types, traits, and error definitions for the Worksmith command
//! engine. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the LLM backend
//! (`Provider`) and the tool catalog (`ToolExecutor`). Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod context;
pub mod error;
pub mod intent;
pub mod message;
pub mod provider;
pub mod result;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use capability::{EntityKind, ToolAction, ToolGroup, ToolKind, ToolSpec};
pub use context::ExecutionContext;
pub use error::{ConfigError, EngineError, Error, ProviderError, Result, ToolError};
pub use intent::IntentClassification;
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage};
pub use result::{ExecutionResult, ToolCallRecord};
pub use tool::{ToolCall, ToolCallResult, ToolExecutor};
