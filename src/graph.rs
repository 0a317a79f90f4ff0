//! Graph construction for conversation topologies.
//!
//! A [`GraphBuilder`] collects nodes and edges with a fluent API and
//! compiles them into an immutable [`Graph`] the executor can run.
//! `NodeKind::Start` and `NodeKind::End` are virtual endpoints: they carry
//! edges but never execute.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::node::Node;
use crate::state::TurnSnapshot;
use crate::types::NodeKind;

/// Predicate function for conditional edge routing.
///
/// Takes a [`TurnSnapshot`] and returns target node names to determine
/// which nodes should be executed next. Target names resolve through
/// [`NodeKind::from`], so `"End"` terminates the turn.
///
/// # Examples
///
/// ```
/// use colloquy::graph::EdgePredicate;
/// use std::sync::Arc;
///
/// let route_on_finish: EdgePredicate = Arc::new(|snapshot| {
///     if snapshot.next.is_finish() {
///         vec!["End".to_string()]
///     } else {
///         vec![snapshot.next.to_string()]
///     }
/// });
/// ```
pub type EdgePredicate = Arc<dyn Fn(TurnSnapshot) -> Vec<String> + Send + Sync + 'static>;

/// A conditional edge that routes based on a predicate function.
///
/// When the executor finishes the `from` node, it evaluates the predicate
/// against the freshly reduced state and schedules the returned targets.
#[derive(Clone)]
pub struct ConditionalEdge {
    from: NodeKind,
    predicate: EdgePredicate,
}

impl ConditionalEdge {
    pub fn new(from: impl Into<NodeKind>, predicate: EdgePredicate) -> Self {
        Self {
            from: from.into(),
            predicate,
        }
    }

    /// Returns the source node of this conditional edge.
    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    /// Returns the predicate function of this conditional edge.
    pub fn predicate(&self) -> &EdgePredicate {
        &self.predicate
    }
}

/// Structural problems detected at compile time.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphCompileError {
    #[error("graph has no edge leaving the virtual Start node")]
    #[diagnostic(
        code(colloquy::graph::no_entry_edge),
        help("add an edge or conditional edge from NodeKind::Start")
    )]
    NoEntryEdge,

    #[error("edge {from} -> {to} targets a node that was never registered")]
    #[diagnostic(
        code(colloquy::graph::unknown_edge_target),
        help("register the target with add_node before compiling")
    )]
    UnknownEdgeTarget { from: String, to: String },
}

/// Builder for constructing conversation graphs with fluent API.
///
/// Every graph needs at least one edge from `NodeKind::Start` and should
/// reach `NodeKind::End` on every path; [`compile`](Self::compile) checks
/// the former statically, while conditional routes are validated by the
/// executor at runtime.
///
/// # Examples
///
/// ```
/// use colloquy::graph::GraphBuilder;
/// use colloquy::types::NodeKind;
///
/// # struct MyNode;
/// # #[async_trait::async_trait]
/// # impl colloquy::node::Node for MyNode {
/// #     async fn run(&self, _: colloquy::state::TurnSnapshot, _: colloquy::node::NodeContext) -> Result<colloquy::node::NodePartial, colloquy::node::NodeError> {
/// #         Ok(colloquy::node::NodePartial::default())
/// #     }
/// # }
///
/// let graph = GraphBuilder::new()
///     .add_node(NodeKind::Custom("worker".into()), MyNode)
///     .add_edge(NodeKind::Start, NodeKind::Custom("worker".into()))
///     .add_edge(NodeKind::Custom("worker".into()), NodeKind::End)
///     .compile()
///     .unwrap();
/// assert_eq!(graph.nodes().len(), 1);
/// ```
pub struct GraphBuilder {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new, empty graph builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// `NodeKind::Start` and `NodeKind::End` are virtual structural
    /// endpoints. If either is passed here, the registration is ignored and
    /// a warning is emitted; they are never executed.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(
                    ?id,
                    "Ignoring registration of virtual node kind (Start/End are virtual)"
                );
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Adds an unconditional edge between two nodes.
    ///
    /// Multiple edges from the same node create fan-out; multiple edges to
    /// the same node create fan-in.
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        self.edges.entry(from).or_default().push(to);
        self
    }

    /// Adds a conditional edge to the graph.
    ///
    /// When execution reaches the `from` node, the `predicate` is evaluated
    /// with the current [`TurnSnapshot`] and returns the target node names
    /// for the next step.
    #[must_use]
    pub fn add_conditional_edge(mut self, from: NodeKind, predicate: EdgePredicate) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, predicate));
        self
    }

    /// Validates the topology and produces an executable [`Graph`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphCompileError::NoEntryEdge`] when nothing leaves
    /// `Start`, and [`GraphCompileError::UnknownEdgeTarget`] when a static
    /// edge points at an unregistered custom node.
    pub fn compile(self) -> Result<Graph, GraphCompileError> {
        let has_static_entry = self
            .edges
            .get(&NodeKind::Start)
            .is_some_and(|targets| !targets.is_empty());
        let has_conditional_entry = self
            .conditional_edges
            .iter()
            .any(|edge| edge.from().is_start());
        if !has_static_entry && !has_conditional_entry {
            return Err(GraphCompileError::NoEntryEdge);
        }

        for (from, targets) in &self.edges {
            for to in targets {
                if to.is_custom() && !self.nodes.contains_key(to) {
                    return Err(GraphCompileError::UnknownEdgeTarget {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
            }
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            conditional_edges: self.conditional_edges,
        })
    }
}

/// A compiled, immutable conversation topology.
#[derive(Clone)]
pub struct Graph {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
}

impl Graph {
    /// Registered executable nodes.
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    /// Static edges by source node.
    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    /// Conditional edges in registration order.
    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeContext, NodeError, NodePartial};
    use async_trait::async_trait;

    struct NoopNode;

    #[async_trait]
    impl Node for NoopNode {
        async fn run(
            &self,
            _snapshot: TurnSnapshot,
            _ctx: NodeContext,
        ) -> Result<NodePartial, NodeError> {
            Ok(NodePartial::default())
        }
    }

    #[test]
    fn test_compile_requires_entry_edge() {
        let result = GraphBuilder::new()
            .add_node(NodeKind::Custom("island".into()), NoopNode)
            .compile();
        assert!(matches!(result, Err(GraphCompileError::NoEntryEdge)));
    }

    #[test]
    fn test_compile_rejects_unknown_target() {
        let result = GraphBuilder::new()
            .add_node(NodeKind::Custom("a".into()), NoopNode)
            .add_edge(NodeKind::Start, NodeKind::Custom("a".into()))
            .add_edge(NodeKind::Custom("a".into()), NodeKind::Custom("ghost".into()))
            .compile();
        assert!(matches!(
            result,
            Err(GraphCompileError::UnknownEdgeTarget { .. })
        ));
    }

    #[test]
    fn test_conditional_entry_satisfies_compile() {
        let graph = GraphBuilder::new()
            .add_node(NodeKind::Custom("a".into()), NoopNode)
            .add_conditional_edge(NodeKind::Start, Arc::new(|_| vec!["a".to_string()]))
            .compile();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_virtual_node_registration_is_ignored() {
        let graph = GraphBuilder::new()
            .add_node(NodeKind::Start, NoopNode)
            .add_node(NodeKind::Custom("a".into()), NoopNode)
            .add_edge(NodeKind::Start, NodeKind::Custom("a".into()))
            .compile()
            .unwrap();
        assert_eq!(graph.nodes().len(), 1);
    }
}
