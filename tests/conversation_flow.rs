//! End-to-end runs of the stock supervisor-routed graph against scripted
//! providers.

mod common;
use common::*;

use std::sync::Arc;

use colloquy::executor::Executor;
use colloquy::message::{Message, ToolCall};
use colloquy::nodes::conversation_graph;
use colloquy::providers::{ChatResponse, RetrievedChunk, ToolRegistry};
use colloquy::router::RouterConfig;
use colloquy::state::{TokenUsage, TurnState};
use serde_json::json;

fn executor(model: Arc<ScriptedModel>) -> Executor {
    let graph = conversation_graph(
        model,
        ToolRegistry::new().register(EchoTool),
        StaticRetriever::empty(),
        RouterConfig::default(),
    )
    .unwrap();
    Executor::new(graph)
}

#[tokio::test]
async fn test_chat_round_trip() {
    // supervisor -> general_assistant -> supervisor -> FINISH
    let model = ScriptedModel::new(vec![
        route_to("general_assistant"),
        reply("Hello! How can I help?"),
        route_to("FINISH"),
    ]);

    let state = TurnState::builder("room").with_user_message("hi").build();
    let final_state = executor(Arc::clone(&model)).invoke(state).await.unwrap();

    assert_eq!(
        final_state.final_reply().map(|m| m.content.as_str()),
        Some("Hello! How can I help?")
    );
    // Routing usage is logged, not billed; only the worker call counts.
    assert_eq!(final_state.usage, TokenUsage::new(10, 5));
    assert!(final_state.errors.is_empty());
    assert_eq!(model.remaining().await, 0);
}

#[tokio::test]
async fn test_research_tool_loop() {
    // supervisor -> researcher (tool call) -> tools -> researcher (answer)
    // -> supervisor -> FINISH
    let model = ScriptedModel::new(vec![
        route_to("researcher"),
        ChatResponse::new(
            Message::assistant_with_calls("", vec![ToolCall::new("echo", json!({"q": "42"}))]),
            TokenUsage::new(20, 4),
        ),
        reply("The echo returned 42."),
        route_to("FINISH"),
    ]);

    let state = TurnState::builder("room")
        .with_user_message("run the echo tool")
        .build();
    let final_state = executor(Arc::clone(&model)).invoke(state).await.unwrap();

    assert_eq!(
        final_state.final_reply().map(|m| m.content.as_str()),
        Some("The echo returned 42.")
    );
    let tool_results: Vec<&Message> = final_state
        .messages
        .iter()
        .filter(|m| m.has_role(Message::TOOL))
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert!(tool_results[0].content.contains("\"q\":\"42\""));
    assert_eq!(final_state.usage, TokenUsage::new(30, 9));
}

#[tokio::test]
async fn test_knowledge_route() {
    let graph = conversation_graph(
        ScriptedModel::new(vec![
            route_to("knowledge_search"),
            reply("Per plan.md, Q3 is streaming."),
            route_to("FINISH"),
        ]),
        ToolRegistry::new(),
        StaticRetriever::new(vec![
            RetrievedChunk::new("Q3 focuses on streaming.").with_source("plan.md"),
        ]),
        RouterConfig::default(),
    )
    .unwrap();

    let state = TurnState::builder("room")
        .with_user_message("what does the plan say?")
        .build();
    let final_state = Executor::new(graph).invoke(state).await.unwrap();
    assert_eq!(
        final_state.final_reply().map(|m| m.content.as_str()),
        Some("Per plan.md, Q3 is streaming.")
    );
}

#[tokio::test]
async fn test_worker_degradation_still_yields_a_reply() {
    // Router picks a worker, the worker's model call fails, the worker
    // degrades, and the supervisor finishes because a reply now exists.
    let model = ScriptedModel::new(vec![
        route_to("general_assistant"),
        // Worker call: exhausted queue means ProviderError.
    ]);

    let state = TurnState::builder("room").with_user_message("hi").build();
    let final_state = executor(model).invoke(state).await.unwrap();

    let reply = final_state.final_reply().expect("degraded reply present");
    assert_eq!(reply.content, colloquy::nodes::DEGRADED_REPLY);
    assert!(!final_state.errors.is_empty());
}

#[tokio::test]
async fn test_exhausted_router_finishes_once_replied() {
    // After the worker replies, the routing model fails; the supervisor's
    // failure path must still terminate the turn.
    let model = ScriptedModel::new(vec![
        route_to("general_assistant"),
        reply("done"),
        // Supervisor's second call fails: queue exhausted.
    ]);

    let state = TurnState::builder("room").with_user_message("hi").build();
    let final_state = executor(model).invoke(state).await.unwrap();
    assert_eq!(final_state.final_reply().map(|m| m.content.as_str()), Some("done"));
    assert_eq!(final_state.errors.len(), 1);
}
