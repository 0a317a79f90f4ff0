//! # Colloquy: Supervisor-routed Conversation Orchestration
//!
//! Colloquy runs multi-worker conversations as a graph: a supervisor node
//! decides which worker acts next, workers contribute messages through
//! channel-specific reducers, and a lifecycle manager wraps every turn with
//! history loading, persistence, and rolling summarization.
//!
//! ## Core Concepts
//!
//! - **Messages**: Role-typed conversation primitives, including tool calls
//! - **Turn state**: Per-turn channels (messages, route, usage, errors) with
//!   one merge policy each
//! - **Nodes**: Async units of work returning partial state updates
//! - **Graph**: Declarative topology with static and conditional edges
//! - **Executor**: Concurrent frontier execution with barrier merges
//! - **Lifecycle**: Load, run, persist, summarize, one room at a time
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use colloquy::config::OrchestratorConfig;
//! use colloquy::executor::Executor;
//! use colloquy::lifecycle::{ConversationManager, TurnRequest};
//! use colloquy::nodes::conversation_graph;
//! use colloquy::providers::{LanguageModel, MemoryConversationStore, Retriever, ToolRegistry};
//!
//! # async fn example(model: Arc<dyn LanguageModel>, retriever: Arc<dyn Retriever>) -> miette::Result<()> {
//! let config = OrchestratorConfig::default();
//! let graph = conversation_graph(
//!     Arc::clone(&model),
//!     ToolRegistry::new(),
//!     retriever,
//!     config.router.clone(),
//! ).map_err(|e| miette::miette!(e.to_string()))?;
//!
//! let manager = ConversationManager::new(
//!     Executor::new(graph),
//!     model,
//!     Arc::new(MemoryConversationStore::new()),
//!     config,
//! );
//!
//! let outcome = manager
//!     .handle_turn(TurnRequest::new("room-1", "What shipped this week?"))
//!     .await
//!     .map_err(|e| miette::miette!(e.to_string()))?;
//! println!("{}", outcome.reply);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`message`] - Message and tool-call types
//! - [`state`] - Turn state, snapshots, and token usage
//! - [`node`] - Node trait and partial updates
//! - [`graph`] - Topology definition and compilation
//! - [`executor`] - Frontier execution, step ceiling, streaming deltas
//! - [`router`] - The supervisor's routing policy
//! - [`nodes`] - Stock workers and the standard conversation graph
//! - [`lifecycle`] - Per-room turn pipeline
//! - [`providers`] - Model, tool, retrieval, and storage adapters
//! - [`reducers`] - Channel merge strategies
//! - [`streaming`] - Client-facing stream buffering

pub mod config;
pub mod errors;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod message;
pub mod node;
pub mod nodes;
pub mod providers;
pub mod reducers;
pub mod router;
pub mod state;
pub mod streaming;
pub mod telemetry;
pub mod types;
