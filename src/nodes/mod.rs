//! The stock worker nodes and the supervisor-routed conversation topology.
//!
//! Every turn enters at the supervisor, which routes to one worker at a
//! time. Chat and knowledge workers hand control straight back; the
//! researcher loops through the tool node until its model stops requesting
//! calls. Routing to FINISH ends the turn.

mod chat;
mod knowledge;
mod research;
mod tools;

pub use chat::GeneralAssistant;
pub use knowledge::KnowledgeSearch;
pub use research::Researcher;
pub use tools::ToolsNode;

use std::sync::Arc;

use crate::errors::ErrorEvent;
use crate::graph::{Graph, GraphBuilder, GraphCompileError};
use crate::message::Message;
use crate::node::NodePartial;
use crate::providers::{LanguageModel, ProviderError, Retriever, ToolRegistry};
use crate::router::{RouterConfig, Supervisor};
use crate::state::TurnSnapshot;
use crate::types::{NodeKind, RouteTarget};

pub const SUPERVISOR: &str = "supervisor";
pub const GENERAL_ASSISTANT: &str = "general_assistant";
pub const RESEARCHER: &str = "researcher";
pub const KNOWLEDGE_SEARCH: &str = "knowledge_search";
pub const TOOLS: &str = "tools";

/// Reply shown to the user when a worker cannot complete its provider call.
pub const DEGRADED_REPLY: &str =
    "I ran into a problem completing that request. Please try again in a moment.";

/// Uniform worker degradation: an apologetic reply, a recorded error event,
/// and a terminal route so the turn ends with something to show the user.
pub(crate) fn degraded(node: &str, step: u64, error: &ProviderError) -> NodePartial {
    tracing::warn!(node, step, %error, "worker degrading after provider failure");
    NodePartial::new()
        .with_messages(vec![Message::assistant(DEGRADED_REPLY).with_generated_id()])
        .with_next(RouteTarget::Finish)
        .with_errors(vec![ErrorEvent::node(node, step, error.to_string())])
}

/// Combines persona, role instructions, and the rolling summary into one
/// system prompt.
pub(crate) fn system_prompt(snapshot: &TurnSnapshot, instructions: &str) -> String {
    let mut prompt = String::new();
    if let Some(persona) = &snapshot.persona {
        prompt.push_str(persona);
        prompt.push_str("\n\n");
    }
    prompt.push_str(instructions);
    if let Some(summary) = &snapshot.summary {
        prompt.push_str("\n\nSummary of the earlier conversation:\n");
        prompt.push_str(summary);
    }
    prompt
}

/// Builds the stock supervisor-routed conversation graph.
///
/// Topology:
///
/// ```text
/// Start -> supervisor -(next)-> general_assistant | researcher | knowledge_search | End
/// general_assistant -> supervisor
/// knowledge_search  -> supervisor
/// researcher -(pending tool calls?)-> tools | supervisor
/// tools -> researcher
/// ```
pub fn conversation_graph(
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    retriever: Arc<dyn Retriever>,
    router: RouterConfig,
) -> Result<Graph, GraphCompileError> {
    GraphBuilder::new()
        .add_node(
            NodeKind::Custom(SUPERVISOR.into()),
            Supervisor::new(Arc::clone(&model), router),
        )
        .add_node(
            NodeKind::Custom(GENERAL_ASSISTANT.into()),
            GeneralAssistant::new(Arc::clone(&model)),
        )
        .add_node(
            NodeKind::Custom(RESEARCHER.into()),
            Researcher::new(Arc::clone(&model), tools.clone()),
        )
        .add_node(
            NodeKind::Custom(KNOWLEDGE_SEARCH.into()),
            KnowledgeSearch::new(model, retriever),
        )
        .add_node(NodeKind::Custom(TOOLS.into()), ToolsNode::new(tools))
        .add_edge(NodeKind::Start, NodeKind::Custom(SUPERVISOR.into()))
        .add_conditional_edge(
            NodeKind::Custom(SUPERVISOR.into()),
            Arc::new(|snapshot: TurnSnapshot| match &snapshot.next {
                RouteTarget::Finish => vec!["End".to_string()],
                RouteTarget::Worker(name) => vec![name.clone()],
            }),
        )
        .add_edge(
            NodeKind::Custom(GENERAL_ASSISTANT.into()),
            NodeKind::Custom(SUPERVISOR.into()),
        )
        .add_edge(
            NodeKind::Custom(KNOWLEDGE_SEARCH.into()),
            NodeKind::Custom(SUPERVISOR.into()),
        )
        .add_conditional_edge(
            NodeKind::Custom(RESEARCHER.into()),
            Arc::new(|snapshot: TurnSnapshot| {
                let pending = snapshot
                    .last_assistant()
                    .is_some_and(Message::has_tool_calls);
                if pending {
                    vec![TOOLS.to_string()]
                } else {
                    vec![SUPERVISOR.to_string()]
                }
            }),
        )
        .add_edge(
            NodeKind::Custom(TOOLS.into()),
            NodeKind::Custom(RESEARCHER.into()),
        )
        .compile()
}
