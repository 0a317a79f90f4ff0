//! The tool execution node.
//!
//! Runs every call requested by the researcher's last assistant message
//! concurrently. Failures are isolated per call: a failing tool produces an
//! error-text result message and an error event, and the remaining calls
//! still complete.

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::instrument;

use crate::errors::ErrorEvent;
use crate::message::{Message, ToolCall};
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::ToolRegistry;
use crate::state::TurnSnapshot;

pub struct ToolsNode {
    tools: ToolRegistry,
}

impl ToolsNode {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    async fn execute(&self, call: &ToolCall, step: u64) -> (Message, Option<ErrorEvent>) {
        let Some(tool) = self.tools.get(&call.name) else {
            let message = format!("tool not found: {}", call.name);
            tracing::warn!(step, call_id = %call.id, %message, "tool dispatch failed");
            return (
                Message::tool_result(&call.id, &message),
                Some(ErrorEvent::node(super::TOOLS, step, message)),
            );
        };

        match tool.call(call.arguments.clone()).await {
            Ok(value) => (Message::tool_result(&call.id, &value.to_string()), None),
            Err(error) => {
                tracing::warn!(step, tool = %call.name, %error, "tool call failed");
                (
                    Message::tool_result(&call.id, &format!("tool call failed: {error}")),
                    Some(
                        ErrorEvent::node(super::TOOLS, step, error.to_string())
                            .with_details(serde_json::json!({"tool": call.name})),
                    ),
                )
            }
        }
    }
}

#[async_trait]
impl Node for ToolsNode {
    #[instrument(skip(self, snapshot, ctx), fields(step = ctx.step))]
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let pending = snapshot
            .last_assistant()
            .filter(|m| m.has_tool_calls())
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        if pending.is_empty() {
            tracing::warn!(step = ctx.step, "tool node reached with no pending calls");
            return Ok(NodePartial::new());
        }

        let results = join_all(pending.iter().map(|call| self.execute(call, ctx.step))).await;

        let mut messages = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (message, error) in results {
            messages.push(message);
            if let Some(event) = error {
                errors.push(event);
            }
        }

        let mut partial = NodePartial::new().with_messages(messages);
        if !errors.is_empty() {
            partial = partial.with_errors(errors);
        }
        Ok(partial)
    }
}
