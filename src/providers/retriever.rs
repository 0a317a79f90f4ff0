//! Knowledge retrieval trait.

use async_trait::async_trait;

use super::ProviderError;

/// A chunk of retrieved context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub content: String,
    /// Where the chunk came from, if the backend tracks provenance.
    pub source: Option<String>,
}

impl RetrievedChunk {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Scope-isolated similarity search over a knowledge base.
///
/// `scope_id` partitions the corpus; a query scoped to one conversation
/// room must never surface another room's documents. Enforcement lives in
/// the backend, but the orchestration core always passes the room id.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError>;
}
