//! The research worker.
//!
//! The researcher exposes the tool registry to the model. When the model
//! responds with tool calls, the graph routes to the tool node and back
//! here with the results appended, so the worker may run several times in
//! one turn before producing its final text.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::{ChatRequest, LanguageModel, ToolRegistry};
use crate::state::TurnSnapshot;

const INSTRUCTIONS: &str = "You are a research assistant. Use the available tools to \
     investigate the user's question, then answer with what you found. When the tools \
     have given you enough, answer in plain text without further calls.";

const FIRST_HOP_NUDGE: &str = " Start by gathering information with a tool call before \
     answering.";

pub struct Researcher {
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
}

impl Researcher {
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolRegistry) -> Self {
        Self { model, tools }
    }
}

#[async_trait]
impl Node for Researcher {
    #[instrument(skip(self, snapshot, ctx), fields(step = ctx.step))]
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        // Nudge toward tool use on the first hop only; once results are in
        // the transcript the model should be free to answer directly.
        let has_results = snapshot
            .messages
            .iter()
            .any(|message| message.has_role(Message::TOOL));
        let instructions = if has_results {
            INSTRUCTIONS.to_string()
        } else {
            format!("{INSTRUCTIONS}{FIRST_HOP_NUDGE}")
        };

        let request = ChatRequest::new(snapshot.messages.clone())
            .with_system(super::system_prompt(&snapshot, &instructions))
            .with_model_opt(snapshot.model_name.clone())
            .with_tools(self.tools.specs());

        match self.model.generate(request).await {
            Ok(response) => {
                if response.message.has_tool_calls() {
                    tracing::debug!(
                        step = ctx.step,
                        calls = response.message.tool_calls.len(),
                        "model requested tool calls"
                    );
                }
                Ok(NodePartial::new()
                    .with_messages(vec![response.message.with_generated_id()])
                    .with_usage(response.usage))
            }
            Err(error) => Ok(super::degraded(super::RESEARCHER, ctx.step, &error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, ToolCall};
    use crate::providers::{ChatResponse, ProviderError, Tool};
    use crate::state::{TokenUsage, TurnState};
    use serde_json::{json, Value};

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Looks things up."
        }
        async fn call(&self, _arguments: Value) -> Result<Value, ProviderError> {
            Ok(json!({"found": true}))
        }
    }

    struct CallingModel;

    #[async_trait]
    impl LanguageModel for CallingModel {
        async fn generate(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            assert_eq!(request.tools.len(), 1);
            assert_eq!(request.tools[0].name, "lookup");
            Ok(ChatResponse::new(
                Message::assistant_with_calls("", vec![ToolCall::new("lookup", json!({"q": "x"}))]),
                TokenUsage::new(30, 8),
            ))
        }
    }

    #[tokio::test]
    async fn test_tool_calls_pass_through_with_specs_advertised() {
        let node = Researcher::new(
            Arc::new(CallingModel),
            ToolRegistry::new().register(Lookup),
        );
        let snapshot = TurnState::builder("c1")
            .with_user_message("look it up")
            .build()
            .snapshot();
        let ctx = NodeContext {
            node_id: super::super::RESEARCHER.into(),
            step: 2,
        };

        let partial = node.run(snapshot, ctx).await.unwrap();
        let messages = partial.messages.unwrap();
        assert!(messages[0].has_tool_calls());
        assert!(messages[0].id.is_some());
    }
}
