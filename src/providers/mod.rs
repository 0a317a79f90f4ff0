//! External interface traits: language model, tools, retrieval, storage.
//!
//! The orchestration core never talks to a vendor API or a database
//! directly. Everything external arrives through the narrow async traits in
//! this module, which keeps the graph testable with scripted fakes and lets
//! embedders plug in whatever backends they run.

mod llm;
mod retriever;
mod store;
mod tool;

pub use llm::{ChatRequest, ChatResponse, LanguageModel, ToolSpec};
pub use retriever::{RetrievedChunk, Retriever};
pub use store::{ConversationEntry, ConversationStore, MemoryConversationStore, RoomHistory};
pub use tool::{Tool, ToolRegistry};

use miette::Diagnostic;
use thiserror::Error;

/// Errors surfaced by external providers.
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    /// The language model call failed.
    #[error("model error: {message}")]
    #[diagnostic(code(colloquy::provider::model))]
    Model { message: String },

    /// A tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    #[diagnostic(code(colloquy::provider::tool))]
    Tool { name: String, message: String },

    /// A retrieval query failed.
    #[error("retrieval error: {message}")]
    #[diagnostic(code(colloquy::provider::retrieval))]
    Retrieval { message: String },

    /// A conversation store operation failed.
    #[error("storage error: {message}")]
    #[diagnostic(code(colloquy::provider::storage))]
    Storage { message: String },
}

impl ProviderError {
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
