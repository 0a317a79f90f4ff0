//! Property tests: the stock graph terminates under adversarial routing.

#[macro_use]
extern crate proptest;

mod common;
use common::StaticRetriever;

use async_trait::async_trait;
use proptest::prelude::{Strategy, prop};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use colloquy::executor::{Executor, ExecutorError};
use colloquy::message::Message;
use colloquy::nodes::conversation_graph;
use colloquy::providers::{
    ChatRequest, ChatResponse, LanguageModel, ProviderError, ToolRegistry,
};
use colloquy::router::RouterConfig;
use colloquy::state::{TokenUsage, TurnState};

/// Replays the scripted texts in order, repeating the last one forever.
/// Both the router and the workers draw from the same sequence, which is
/// exactly the kind of misbehaving backend the routing policy must survive.
struct CyclingModel {
    texts: Vec<String>,
    cursor: AtomicUsize,
}

#[async_trait]
impl LanguageModel for CyclingModel {
    async fn generate(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        let text = self.texts[i.min(self.texts.len() - 1)].clone();
        Ok(ChatResponse::new(
            Message::assistant(&text),
            TokenUsage::new(1, 1),
        ))
    }
}

fn block_on<F: std::future::Future<Output = ()>>(fut: F) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(fut);
}

/// Arbitrary model output: valid decisions, undeclared workers, bare
/// tokens, and free text.
fn model_output_strategy() -> impl Strategy<Value = String> {
    prop::strategy::Union::new(vec![
        prop::string::string_regex(r#"\{"next": "[a-z_]{1,12}"\}"#)
            .unwrap()
            .boxed(),
        prop::string::string_regex("[A-Za-z_]{1,12}").unwrap().boxed(),
        prop::string::string_regex("[ -~]{0,40}").unwrap().boxed(),
        proptest::strategy::Just(r#"{"next": "FINISH"}"#.to_string()).boxed(),
        proptest::strategy::Just(r#"{"next": "general_assistant"}"#.to_string()).boxed(),
    ])
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn prop_turn_always_terminates(texts in prop::collection::vec(model_output_strategy(), 1..12)) {
        block_on(async move {
            let model = Arc::new(CyclingModel {
                texts,
                cursor: AtomicUsize::new(0),
            });
            let graph = conversation_graph(
                model,
                ToolRegistry::new(),
                StaticRetriever::empty(),
                RouterConfig::default(),
            )
            .unwrap();

            let state = TurnState::builder("room").with_user_message("go").build();
            let result = Executor::new(graph).invoke(state).await;

            match result {
                Ok(final_state) => {
                    // A finished turn never ends empty-handed: the clamp
                    // guarantees at least one assistant message.
                    assert!(final_state.last_assistant().is_some());
                }
                Err(ExecutorError::StepLimitExceeded { .. }) => {}
                Err(other) => panic!("unexpected executor failure: {other}"),
            }
        });
    }
}
