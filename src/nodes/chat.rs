//! The general assistant worker.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::{ChatRequest, LanguageModel};
use crate::state::TurnSnapshot;

const INSTRUCTIONS: &str = "You are a helpful assistant in an ongoing conversation. \
     Answer the user's latest message directly and concisely.";

/// Handles general questions and chit-chat with a single model call.
pub struct GeneralAssistant {
    model: Arc<dyn LanguageModel>,
}

impl GeneralAssistant {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Node for GeneralAssistant {
    #[instrument(skip(self, snapshot, ctx), fields(step = ctx.step))]
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let request = ChatRequest::new(snapshot.messages.clone())
            .with_system(super::system_prompt(&snapshot, INSTRUCTIONS))
            .with_model_opt(snapshot.model_name.clone());

        match self.model.generate(request).await {
            Ok(response) => Ok(NodePartial::new()
                .with_messages(vec![response.message.with_generated_id()])
                .with_usage(response.usage)),
            Err(error) => Ok(super::degraded(super::GENERAL_ASSISTANT, ctx.step, &error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::providers::{ChatResponse, ProviderError};
    use crate::state::{TokenUsage, TurnState};
    use crate::types::RouteTarget;

    struct OkModel;

    #[async_trait]
    impl LanguageModel for OkModel {
        async fn generate(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            assert!(request.system.is_some());
            Ok(ChatResponse::new(
                Message::assistant("sure thing"),
                TokenUsage::new(40, 12),
            ))
        }
    }

    struct DownModel;

    #[async_trait]
    impl LanguageModel for DownModel {
        async fn generate(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::model("connection refused"))
        }
    }

    fn ctx() -> NodeContext {
        NodeContext {
            node_id: super::super::GENERAL_ASSISTANT.into(),
            step: 2,
        }
    }

    #[tokio::test]
    async fn test_reply_carries_usage_and_id() {
        let node = GeneralAssistant::new(Arc::new(OkModel));
        let snapshot = TurnState::builder("c1").with_user_message("hi").build().snapshot();
        let partial = node.run(snapshot, ctx()).await.unwrap();

        let messages = partial.messages.unwrap();
        assert_eq!(messages[0].content, "sure thing");
        assert!(messages[0].id.is_some());
        assert_eq!(partial.usage, Some(TokenUsage::new(40, 12)));
        assert!(partial.next.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let node = GeneralAssistant::new(Arc::new(DownModel));
        let snapshot = TurnState::builder("c1").with_user_message("hi").build().snapshot();
        let partial = node.run(snapshot, ctx()).await.unwrap();

        let messages = partial.messages.unwrap();
        assert_eq!(messages[0].content, super::super::DEGRADED_REPLY);
        assert_eq!(partial.next, Some(RouteTarget::Finish));
        assert_eq!(partial.errors.map(|e| e.len()), Some(1));
    }
}
