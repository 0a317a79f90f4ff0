//! The supervisor node that decides which worker runs next.
//!
//! Routing layers four policies, highest priority first: loop detection
//! forces termination, then a structured model decision is requested, a
//! malformed or undeclared decision falls back to the default worker, and a
//! final clamp refuses to finish a turn that produced no assistant reply.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::providers::{ChatRequest, LanguageModel};
use crate::state::TurnSnapshot;
use crate::types::RouteTarget;

/// A worker the supervisor may route to, with the description shown to the
/// routing model.
#[derive(Clone, Debug)]
pub struct WorkerSpec {
    pub name: String,
    pub description: String,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Routing policy knobs.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Workers the routing model may choose from.
    pub workers: Vec<WorkerSpec>,
    /// Worker used when the model's decision is unusable.
    pub fallback: String,
    /// How many trailing messages loop detection inspects.
    pub loop_window: usize,
    /// Identical assistant replies within the window that count as a loop.
    pub repeat_threshold: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            workers: vec![
                WorkerSpec::new(
                    crate::nodes::GENERAL_ASSISTANT,
                    "Answers general questions and handles chit-chat directly.",
                ),
                WorkerSpec::new(
                    crate::nodes::RESEARCHER,
                    "Investigates questions that need external tools or multi-step lookups.",
                ),
                WorkerSpec::new(
                    crate::nodes::KNOWLEDGE_SEARCH,
                    "Searches the room's stored knowledge for relevant passages.",
                ),
            ],
            fallback: crate::nodes::GENERAL_ASSISTANT.to_string(),
            loop_window: 6,
            repeat_threshold: 3,
        }
    }
}

impl RouterConfig {
    fn is_declared(&self, name: &str) -> bool {
        self.workers.iter().any(|w| w.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct RouteDecision {
    next: String,
}

/// The supervisor node.
///
/// Writes only the `next` channel (plus error events). Routing-model token
/// usage is logged but never accumulated into the turn total, so billing
/// reflects user-visible work only.
pub struct Supervisor {
    model: Arc<dyn LanguageModel>,
    config: RouterConfig,
}

impl Supervisor {
    pub fn new(model: Arc<dyn LanguageModel>, config: RouterConfig) -> Self {
        Self { model, config }
    }

    fn routing_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are the supervisor of a team of workers handling one user conversation. \
             Decide which worker acts next, or reply FINISH when the conversation turn is \
             complete.\n\nWorkers:\n",
        );
        for worker in &self.config.workers {
            prompt.push_str(&format!("- {}: {}\n", worker.name, worker.description));
        }
        prompt.push_str(&format!(
            "\nCurrent time: {}\nRespond with JSON: {{\"next\": \"<worker or FINISH>\"}}",
            Utc::now().to_rfc3339()
        ));
        prompt
    }

    fn response_schema(&self) -> serde_json::Value {
        let mut options: Vec<&str> = self.config.workers.iter().map(|w| w.name.as_str()).collect();
        options.push(RouteTarget::FINISH);
        json!({
            "type": "object",
            "properties": {
                "next": { "type": "string", "enum": options }
            },
            "required": ["next"]
        })
    }

    /// Detects routing loops in the current turn's message tail.
    ///
    /// Two signals: the same assistant reply repeated `repeat_threshold`
    /// times within the trailing `loop_window` messages, or the last four
    /// assistant replies alternating between two distinct texts. Only
    /// replies produced this turn are inspected; repetitive loaded history
    /// (a user asking the same thing across turns) is not a routing loop.
    fn detect_loop(&self, snapshot: &TurnSnapshot) -> bool {
        let turn = snapshot.current_turn();
        let tail_start = turn.len().saturating_sub(self.config.loop_window);
        let tail_assistants: Vec<&str> = turn[tail_start..]
            .iter()
            .filter(|m| m.has_role(Message::ASSISTANT) && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .collect();
        for content in &tail_assistants {
            let repeats = tail_assistants.iter().filter(|c| *c == content).count();
            if repeats >= self.config.repeat_threshold {
                return true;
            }
        }

        let assistants: Vec<&str> = turn
            .iter()
            .filter(|m| m.has_role(Message::ASSISTANT) && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .collect();
        if let [.., a1, b1, a2, b2] = assistants.as_slice()
            && a1 == a2
            && b1 == b2
            && a1 != b1
        {
            return true;
        }
        false
    }

    /// Parses the model's decision. Accepts the JSON shape or, as a lenient
    /// fallback, a bare worker name / FINISH token.
    fn parse_decision(content: &str) -> Option<RouteTarget> {
        if let Ok(decision) = serde_json::from_str::<RouteDecision>(content) {
            return Some(RouteTarget::parse(&decision.next));
        }
        let trimmed = content.trim().trim_matches('"');
        if !trimmed.is_empty() && !trimmed.contains(char::is_whitespace) {
            return Some(RouteTarget::parse(trimmed));
        }
        None
    }

    /// Never finish a turn with no assistant reply of its own to show the
    /// user. Replies in loaded history do not count; finishing on one would
    /// re-serve the previous turn's answer without running any worker.
    fn clamp(&self, decision: RouteTarget, snapshot: &TurnSnapshot) -> RouteTarget {
        if decision.is_finish() && snapshot.turn_assistant().is_none() {
            tracing::warn!(
                fallback = %self.config.fallback,
                "routing decided FINISH before any assistant reply; clamping to fallback worker"
            );
            return RouteTarget::worker(&self.config.fallback);
        }
        decision
    }
}

#[async_trait]
impl Node for Supervisor {
    #[instrument(skip(self, snapshot, ctx), fields(step = ctx.step))]
    async fn run(
        &self,
        snapshot: TurnSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        if self.detect_loop(&snapshot) {
            tracing::warn!(step = ctx.step, "routing loop detected; forcing FINISH");
            return Ok(NodePartial::new().with_next(RouteTarget::Finish));
        }

        let request = ChatRequest::new(snapshot.messages.clone())
            .with_system(self.routing_prompt())
            .with_model_opt(snapshot.model_name.clone())
            .with_response_schema(self.response_schema());

        let response = match self.model.generate(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(step = ctx.step, %error, "routing model call failed");
                let event =
                    ErrorEvent::router(ctx.step, format!("routing model call failed: {error}"));
                // With a reply already produced this turn the safest exit is
                // FINISH; otherwise hand the turn to the fallback worker.
                let target = if snapshot.turn_assistant().is_some() {
                    RouteTarget::Finish
                } else {
                    RouteTarget::worker(&self.config.fallback)
                };
                return Ok(NodePartial::new().with_next(target).with_errors(vec![event]));
            }
        };

        tracing::info!(
            step = ctx.step,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "routing decision usage"
        );

        let mut errors: Vec<ErrorEvent> = Vec::new();
        let decision = match Self::parse_decision(&response.message.content) {
            Some(RouteTarget::Worker(name)) if !self.config.is_declared(&name) => {
                errors.push(ErrorEvent::router(
                    ctx.step,
                    format!("routing model chose undeclared worker: {name}"),
                ));
                RouteTarget::worker(&self.config.fallback)
            }
            Some(decision) => decision,
            None => {
                errors.push(ErrorEvent::router(
                    ctx.step,
                    format!("malformed routing decision: {}", response.message.content),
                ));
                RouteTarget::worker(&self.config.fallback)
            }
        };

        let decision = self.clamp(decision, &snapshot);
        tracing::info!(step = ctx.step, next = %decision, "routed");

        let mut partial = NodePartial::new().with_next(decision);
        if !errors.is_empty() {
            partial = partial.with_errors(errors);
        }
        Ok(partial)
    }
}
