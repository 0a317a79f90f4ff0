//! Node execution framework for the conversation graph.
//!
//! This module provides the core abstractions for executable nodes: the
//! [`Node`] trait, the execution context, partial state updates, and fatal
//! node errors.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::providers::ProviderError;
use crate::state::{TokenUsage, TurnSnapshot};
use crate::types::RouteTarget;

/// A single unit of computation within a conversation turn.
///
/// Nodes receive an immutable snapshot of the turn state plus their
/// execution context, do their work, and return a [`NodePartial`] describing
/// the channels they want updated. The executor is the only component that
/// applies those updates.
///
/// # Error Handling
///
/// - **Fatal errors**: return `Err(NodeError)` to fail the turn.
/// - **Recoverable errors**: record an [`ErrorEvent`] in
///   `NodePartial.errors` and return `Ok`. Worker nodes follow this path
///   for provider failures, degrading to an apologetic reply instead of
///   crashing the turn.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against the given snapshot.
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

/// Execution context passed to nodes.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of the node being executed.
    pub node_id: String,
    /// Current execution step within the turn, starting at 1.
    pub step: u64,
}

/// Partial state update returned by node execution.
///
/// All fields are optional; nodes update only the channels they care about.
/// `usage` is a delta, accumulated into the turn total by the usage reducer.
///
/// # Examples
///
/// ```
/// use colloquy::node::NodePartial;
/// use colloquy::message::Message;
/// use colloquy::state::TokenUsage;
///
/// let partial = NodePartial::new()
///     .with_messages(vec![Message::assistant("Done.")])
///     .with_usage(TokenUsage::new(120, 34));
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Messages to merge into the turn's message sequence.
    pub messages: Option<Vec<Message>>,
    /// A routing decision. Written by the router, and by degrading workers
    /// forcing termination.
    pub next: Option<RouteTarget>,
    /// Token usage delta for provider calls made by this node.
    pub usage: Option<TokenUsage>,
    /// Recoverable errors to append to the turn's error channel.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl NodePartial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach one or more messages.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Attach a routing decision.
    #[must_use]
    pub fn with_next(mut self, next: RouteTarget) -> Self {
        self.next = Some(next);
        self
    }

    /// Attach a token usage delta.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Attach one or more recoverable errors.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Returns `true` if no channel carries data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.as_ref().is_none_or(|m| m.is_empty())
            && self.next.is_none()
            && self.usage.is_none()
            && self.errors.as_ref().is_none_or(|e| e.is_empty())
    }
}

/// Fatal errors during node execution.
///
/// For recoverable failures that should degrade instead of halting the
/// turn, use `NodePartial.errors`.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(colloquy::node::missing_input),
        help("Check that a previous node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// External provider failure the node chose not to absorb.
    #[error(transparent)]
    #[diagnostic(code(colloquy::node::provider))]
    Provider(#[from] ProviderError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(colloquy::node::serde_json))]
    Serde(#[from] serde_json::Error),
}
