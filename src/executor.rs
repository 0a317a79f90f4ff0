//! Graph execution with barrier-applied state updates.
//!
//! The [`Executor`] drives a compiled [`Graph`] step by step: every node in
//! the current frontier runs concurrently against the same snapshot, their
//! partial updates are folded into the turn state through the reducer
//! registry, and the next frontier is computed from static and conditional
//! edges. A step ceiling bounds every turn so routing cycles cannot spin
//! forever.

use futures_util::future::join_all;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::instrument;

use crate::errors::ErrorEvent;
use crate::graph::Graph;
use crate::message::Message;
use crate::node::{NodeContext, NodeError};
use crate::reducers::{ReducerError, ReducerRegistry};
use crate::state::{TokenUsage, TurnState};
use crate::types::{NodeKind, RouteTarget};

/// Default ceiling on execution steps per turn.
pub const DEFAULT_STEP_LIMIT: u64 = 20;

/// Errors that terminate a turn abnormally.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    #[error("turn exceeded the step limit of {limit}")]
    #[diagnostic(
        code(colloquy::executor::step_limit),
        help("raise the limit with Executor::with_step_limit or check the routing for cycles")
    )]
    StepLimitExceeded { limit: u64 },

    #[error("graph produced an empty initial frontier")]
    #[diagnostic(code(colloquy::executor::no_entry_edges))]
    NoEntryEdges,

    #[error("node {node} failed: {source}")]
    #[diagnostic(code(colloquy::executor::node))]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reducer(#[from] ReducerError),

    #[error("execution task failed to join")]
    #[diagnostic(code(colloquy::executor::join))]
    Join(#[from] JoinError),
}

/// What one completed node contributed during one step.
///
/// Streaming consumers receive one delta per node completion, in barrier
/// order within a step.
#[derive(Clone, Debug)]
pub struct StepDelta {
    pub step: u64,
    pub node: NodeKind,
    pub messages: Vec<Message>,
    pub next: Option<RouteTarget>,
    pub usage: Option<TokenUsage>,
    pub errors: Vec<ErrorEvent>,
}

/// Receiving side of a streaming invocation.
///
/// The stream closes when the turn finishes or fails. Dropping it does not
/// cancel the run; use the [`InvocationHandle`] for that.
pub struct TurnStream {
    receiver: flume::Receiver<StepDelta>,
}

impl TurnStream {
    pub(crate) fn new(receiver: flume::Receiver<StepDelta>) -> Self {
        Self { receiver }
    }

    /// Next delta, or `None` once the turn is over and the channel drained.
    pub async fn next(&mut self) -> Option<StepDelta> {
        self.receiver.recv_async().await.ok()
    }
}

/// Handle for a streaming turn invocation.
///
/// Dropping the handle does not abort the turn; call
/// [`abort`](InvocationHandle::abort) to stop it, or
/// [`join`](InvocationHandle::join) to await the final state.
pub struct InvocationHandle {
    join_handle: Option<JoinHandle<Result<TurnState, ExecutorError>>>,
}

impl InvocationHandle {
    /// Abort the underlying task. `join` will return a join error afterwards.
    pub fn abort(&self) {
        if let Some(handle) = &self.join_handle {
            handle.abort();
        }
    }

    /// Returns true if the underlying task has completed or aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }

    /// Await the final turn state.
    pub async fn join(mut self) -> Result<TurnState, ExecutorError> {
        match self.join_handle.take() {
            Some(handle) => handle.await?,
            None => Err(ExecutorError::NoEntryEdges),
        }
    }
}

/// Runs a compiled graph to completion for one conversation turn.
///
/// # Examples
///
/// ```no_run
/// # async fn example(graph: colloquy::graph::Graph) -> Result<(), colloquy::executor::ExecutorError> {
/// use colloquy::executor::Executor;
/// use colloquy::state::TurnState;
///
/// let executor = Executor::new(graph);
/// let state = TurnState::builder("room-1")
///     .with_user_message("hello")
///     .build();
/// let final_state = executor.invoke(state).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Executor {
    graph: Arc<Graph>,
    reducers: ReducerRegistry,
    step_limit: u64,
}

impl Executor {
    /// Creates an executor with the default reducer registry and step limit.
    #[must_use]
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: Arc::new(graph),
            reducers: ReducerRegistry::default(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Overrides the step ceiling.
    #[must_use]
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Overrides the reducer registry.
    #[must_use]
    pub fn with_reducers(mut self, reducers: ReducerRegistry) -> Self {
        self.reducers = reducers;
        self
    }

    /// Runs the graph to completion and returns the final state.
    #[instrument(skip(self, state), fields(conversation_id = %state.conversation_id), err)]
    pub async fn invoke(&self, state: TurnState) -> Result<TurnState, ExecutorError> {
        self.invoke_observed(state, None).await
    }

    /// Runs the graph on a background task, streaming one [`StepDelta`] per
    /// completed node.
    ///
    /// A disconnected stream never interrupts the run; deltas to a dropped
    /// receiver are discarded.
    pub fn invoke_streaming(&self, state: TurnState) -> (InvocationHandle, TurnStream) {
        let (tx, rx) = flume::unbounded();
        let executor = self.clone();
        let join = tokio::spawn(async move { executor.invoke_observed(state, Some(tx)).await });
        (
            InvocationHandle {
                join_handle: Some(join),
            },
            TurnStream::new(rx),
        )
    }

    pub(crate) async fn invoke_observed(
        &self,
        mut state: TurnState,
        delta_tx: Option<flume::Sender<StepDelta>>,
    ) -> Result<TurnState, ExecutorError> {
        let mut step: u64 = 0;
        let mut frontier = self.initial_frontier(&state);
        if frontier.is_empty() {
            return Err(ExecutorError::NoEntryEdges);
        }

        loop {
            frontier.retain(|kind| !kind.is_end());
            if frontier.is_empty() {
                tracing::info!(step, "turn complete");
                return Ok(state);
            }

            step += 1;
            if step > self.step_limit {
                return Err(ExecutorError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }

            let ran = self.run_frontier(&state, &frontier, step).await;

            // Barrier: fold partials into state in frontier order, emitting
            // one delta per completed node.
            let mut completed: Vec<NodeKind> = Vec::with_capacity(ran.len());
            for (kind, result) in ran {
                let partial = result.map_err(|source| ExecutorError::Node {
                    node: kind.to_string(),
                    source,
                })?;
                self.reducers.apply_all(&mut state, &partial)?;
                if let Some(tx) = &delta_tx {
                    let _ = tx.send(StepDelta {
                        step,
                        node: kind.clone(),
                        messages: partial.messages.unwrap_or_default(),
                        next: partial.next,
                        usage: partial.usage,
                        errors: partial.errors.unwrap_or_default(),
                    });
                }
                completed.push(kind);
            }

            frontier = self.compute_next_frontier(&state, &completed, step);
        }
    }

    /// Runs every frontier node concurrently against the same snapshot.
    async fn run_frontier(
        &self,
        state: &TurnState,
        frontier: &[NodeKind],
        step: u64,
    ) -> Vec<(NodeKind, Result<crate::node::NodePartial, NodeError>)> {
        let snapshot = state.snapshot();
        let futures = frontier.iter().filter_map(|kind| {
            let Some(node) = self.graph.nodes().get(kind) else {
                tracing::warn!(step, node = %kind, "frontier node not registered; skipping");
                return None;
            };
            let node = Arc::clone(node);
            let snapshot = snapshot.clone();
            let ctx = NodeContext {
                node_id: kind.to_string(),
                step,
            };
            let kind = kind.clone();
            Some(async move {
                tracing::debug!(step, node = %kind, "running node");
                let result = node.run(snapshot, ctx).await;
                (kind, result)
            })
        });
        join_all(futures).await
    }

    fn initial_frontier(&self, state: &TurnState) -> Vec<NodeKind> {
        let mut frontier: Vec<NodeKind> = self
            .graph
            .edges()
            .get(&NodeKind::Start)
            .cloned()
            .unwrap_or_default();
        let snapshot = state.snapshot();
        for edge in self
            .graph
            .conditional_edges()
            .iter()
            .filter(|e| e.from().is_start())
        {
            for target_name in (edge.predicate())(snapshot.clone()) {
                frontier.push(NodeKind::from(target_name.as_str()));
            }
        }
        self.validated(frontier, 0)
    }

    /// Compute the next frontier from static and conditional edges.
    fn compute_next_frontier(
        &self,
        state: &TurnState,
        ran: &[NodeKind],
        step: u64,
    ) -> Vec<NodeKind> {
        let snapshot = state.snapshot();
        let mut targets: Vec<NodeKind> = Vec::new();

        for id in ran {
            if let Some(static_targets) = self.graph.edges().get(id) {
                targets.extend(static_targets.iter().cloned());
            }
            for edge in self
                .graph
                .conditional_edges()
                .iter()
                .filter(|e| e.from() == id)
            {
                tracing::debug!(from = %id, step, "evaluating conditional edge");
                for target_name in (edge.predicate())(snapshot.clone()) {
                    let target = NodeKind::from(target_name.as_str());
                    tracing::debug!(target = %target, step, "conditional edge routed");
                    targets.push(target);
                }
            }
        }

        self.validated(targets, step)
    }

    /// Deduplicates and drops unregistered custom targets with a warning.
    fn validated(&self, targets: Vec<NodeKind>, step: u64) -> Vec<NodeKind> {
        let mut frontier: Vec<NodeKind> = Vec::new();
        for target in targets {
            let is_valid = match &target {
                NodeKind::End | NodeKind::Start => true,
                NodeKind::Custom(_) => self.graph.nodes().contains_key(&target),
            };
            if !is_valid {
                tracing::warn!(step, target = %target.encode(), "frontier target not found; skipping");
                continue;
            }
            if !frontier.contains(&target) {
                frontier.push(target);
            }
        }
        frontier
    }
}
