//! Language model adapter trait.

use async_trait::async_trait;
use serde_json::Value;

use super::ProviderError;
use crate::message::Message;
use crate::state::TokenUsage;

/// A tool made visible to the model in a chat request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: Value,
}

/// A single chat completion request.
///
/// # Examples
///
/// ```
/// use colloquy::providers::ChatRequest;
/// use colloquy::message::Message;
///
/// let request = ChatRequest::new(vec![Message::user("hi")])
///     .with_system("You are terse.")
///     .with_model("small-fast");
/// assert!(request.tools.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    /// Conversation messages, oldest first.
    pub messages: Vec<Message>,
    /// System prompt prepended to the conversation.
    pub system: Option<String>,
    /// Model override; providers fall back to their default when absent.
    pub model: Option<String>,
    /// Tools the model may invoke.
    pub tools: Vec<ToolSpec>,
    /// JSON schema constraining the response to structured output.
    pub response_schema: Option<Value>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Carries an optional model override without an extra `match` at call
    /// sites.
    #[must_use]
    pub fn with_model_opt(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A chat completion response.
///
/// Providers that know which model actually served the call stamp it on
/// `message.model` so persistence can record the resolved name even when
/// the request carried no override.
#[derive(Clone, Debug)]
pub struct ChatResponse {
    /// The assistant message, possibly carrying tool calls.
    pub message: Message,
    /// Token usage reported by the provider for this call.
    pub usage: TokenUsage,
}

impl ChatResponse {
    #[must_use]
    pub fn new(message: Message, usage: TokenUsage) -> Self {
        Self { message, usage }
    }
}

/// Adapter over a chat-completion capable language model.
///
/// Implementations wrap a vendor SDK or an HTTP client; the orchestration
/// core only ever sees this trait.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}
