//! Conversation core for the SmartChef catalog assistant.
//!
//! The crate owns everything that is independent of the catalog itself:
//! the conversation model, the tool registry with its parameter contracts,
//! the language-model boundary and the orchestrator that loops between them.

pub mod conversation;
pub mod event;
pub mod llm;
pub mod orchestrator;
pub mod registry;
pub mod schema;

pub use conversation::{Conversation, ConversationError, ConversationTurn, ToolCallRequest, ToolOutcome};
pub use event::{ChatEvent, FinishReason};
pub use llm::{Brain, LanguageModel, LlmConfig, ModelChunk, ModelRequest, ModelStream};
pub use orchestrator::{AssistantConfig, Orchestrator, OrchestratorError, RunSummary};
pub use registry::{RegistryError, ToolDefinition, ToolError, ToolExecutor, ToolRegistry, ToolSpec};
pub use schema::{ParamField, ParamSchema, ParamType};
