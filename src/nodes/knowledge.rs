//! The knowledge search worker.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::{ChatRequest, LanguageModel, Retriever};
use crate::state::TurnSnapshot;

const INSTRUCTIONS: &str = "You answer using the retrieved passages below. Cite what you \
     use. If the passages do not cover the question, say so plainly instead of guessing.";

/// How many chunks a knowledge lookup retrieves.
const RETRIEVAL_K: usize = 5;

/// Answers from the room's stored knowledge: retrieve, then synthesize.
///
/// Retrieval is scoped to the conversation id, so rooms never see each
/// other's documents.
pub struct KnowledgeSearch {
    model: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
}

impl KnowledgeSearch {
    pub fn new(model: Arc<dyn LanguageModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self { model, retriever }
    }
}

#[async_trait]
impl Node for KnowledgeSearch {
    #[instrument(skip(self, snapshot, ctx), fields(step = ctx.step))]
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let query = snapshot
            .last_user()
            .map(|m| m.content.clone())
            .ok_or(NodeError::MissingInput {
                what: "a user message to search for",
            })?;

        let chunks = match self
            .retriever
            .search(&query, &snapshot.conversation_id, RETRIEVAL_K)
            .await
        {
            Ok(chunks) => chunks,
            Err(error) => return Ok(super::degraded(super::KNOWLEDGE_SEARCH, ctx.step, &error)),
        };
        tracing::debug!(step = ctx.step, retrieved = chunks.len(), "knowledge retrieved");

        let mut prompt = super::system_prompt(&snapshot, INSTRUCTIONS);
        if chunks.is_empty() {
            prompt.push_str("\n\nNo stored passages matched the question.");
        } else {
            prompt.push_str("\n\nRetrieved passages:");
            for chunk in &chunks {
                match &chunk.source {
                    Some(source) => prompt.push_str(&format!("\n[{source}] {}", chunk.content)),
                    None => prompt.push_str(&format!("\n- {}", chunk.content)),
                }
            }
        }

        let request = ChatRequest::new(snapshot.messages.clone())
            .with_system(prompt)
            .with_model_opt(snapshot.model_name.clone());

        match self.model.generate(request).await {
            Ok(response) => Ok(NodePartial::new()
                .with_messages(vec![response.message.with_generated_id()])
                .with_usage(response.usage)),
            Err(error) => Ok(super::degraded(super::KNOWLEDGE_SEARCH, ctx.step, &error)),
        }
    }
}
