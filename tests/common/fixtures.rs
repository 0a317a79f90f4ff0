//! Shared fixtures: scripted providers that stand in for real model, tool,
//! and retrieval backends.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use colloquy::message::Message;
use colloquy::providers::{
    ChatRequest, ChatResponse, LanguageModel, ProviderError, RetrievedChunk, Retriever, Tool,
};
use colloquy::state::TokenUsage;

/// A model that replays a fixed queue of responses in order.
///
/// Panics when asked for more responses than scripted, which makes an
/// unexpected extra model call a loud test failure.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ChatResponse>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Scripts a sequence of plain assistant replies, each with token usage.
    pub fn replies(texts: &[&str]) -> Arc<Self> {
        Self::new(
            texts
                .iter()
                .map(|t| ChatResponse::new(Message::assistant(t), TokenUsage::new(10, 5)))
                .collect(),
        )
    }

    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ProviderError::model("scripted model exhausted"))
    }
}

/// A model that always fails.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::model("provider unavailable"))
    }
}

/// Echoes its arguments back as the tool result.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Returns its arguments."
    }
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        Ok(arguments)
    }
}

/// Serves a fixed set of chunks regardless of query.
pub struct StaticRetriever {
    pub chunks: Vec<RetrievedChunk>,
}

impl StaticRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Arc<Self> {
        Arc::new(Self { chunks })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(
        &self,
        _query: &str,
        _scope_id: &str,
        _k: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError> {
        Ok(self.chunks.clone())
    }
}

/// A routing decision in the JSON shape the supervisor expects.
pub fn route_to(target: &str) -> ChatResponse {
    ChatResponse::new(
        Message::assistant(&format!("{{\"next\": \"{target}\"}}")),
        TokenUsage::new(3, 1),
    )
}

/// A worker reply with usage attached.
pub fn reply(text: &str) -> ChatResponse {
    ChatResponse::new(Message::assistant(text), TokenUsage::new(10, 5))
}
