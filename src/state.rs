//! Turn state for the conversation graph.
//!
//! A [`TurnState`] is built once per conversation turn from stored history
//! plus the new user message, mutated only by the executor through the
//! reducer registry, and read by nodes through immutable [`TurnSnapshot`]s.
//!
//! # Channels
//!
//! The mutable parts of the state map onto four channels, each with its own
//! merge policy (see [`crate::reducers`]): messages, the route target, token
//! usage, and error events. The identity fields (user, room, persona, model,
//! summary) are fixed for the duration of a turn.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::types::RouteTarget;

/// Token usage counters for a conversation turn.
///
/// Nodes report usage *deltas* in their partial updates; the usage reducer
/// accumulates them into the turn total. A total that stayed at zero means
/// the provider reported nothing, which persistence records as absent
/// rather than as a measured zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Creates a usage delta.
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Accumulates another delta into this total.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }

    /// Returns `true` if nothing was tracked.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// The shared state of one conversation turn.
///
/// # Examples
///
/// ```
/// use colloquy::state::TurnState;
///
/// let state = TurnState::builder("room-42")
///     .with_user_id("ada")
///     .with_persona("You are a concise release-notes assistant.")
///     .with_user_message("What shipped this week?")
///     .build();
///
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.messages.len(), 1);
/// assert_eq!(snapshot.conversation_id, "room-42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnState {
    /// Full message sequence: loaded history plus this turn's additions.
    pub messages: Vec<Message>,
    /// Identity of the requesting user.
    pub user_id: String,
    /// Conversation room this turn belongs to. Also scopes retrieval.
    pub conversation_id: String,
    /// Persona text injected into worker prompts, if configured.
    pub persona: Option<String>,
    /// Model override for provider calls, if requested.
    pub model_name: Option<String>,
    /// Rolling summary of older history, if one exists.
    pub summary: Option<String>,
    /// The supervisor's current routing decision.
    pub next: RouteTarget,
    /// Accumulated token usage for this turn.
    pub usage: TokenUsage,
    /// Recoverable errors observed so far.
    pub errors: Vec<ErrorEvent>,
}

/// Immutable view of a [`TurnState`] handed to nodes during execution.
///
/// Snapshots are cloned data: nodes can inspect them freely without
/// affecting the state the executor continues to own.
#[derive(Clone, Debug)]
pub struct TurnSnapshot {
    pub messages: Vec<Message>,
    pub user_id: String,
    pub conversation_id: String,
    pub persona: Option<String>,
    pub model_name: Option<String>,
    pub summary: Option<String>,
    pub next: RouteTarget,
    pub usage: TokenUsage,
    pub errors: Vec<ErrorEvent>,
}

impl TurnState {
    /// Sentinel user id substituted when a turn arrives without one.
    pub const ANONYMOUS_USER: &'static str = "anonymous";

    /// Creates a builder for a turn in the given conversation room.
    pub fn builder(conversation_id: impl Into<String>) -> TurnStateBuilder {
        TurnStateBuilder::new(conversation_id)
    }

    /// Creates an immutable snapshot of the current state.
    pub fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            messages: self.messages.clone(),
            user_id: self.user_id.clone(),
            conversation_id: self.conversation_id.clone(),
            persona: self.persona.clone(),
            model_name: self.model_name.clone(),
            summary: self.summary.clone(),
            next: self.next.clone(),
            usage: self.usage,
            errors: self.errors.clone(),
        }
    }

    /// The most recent assistant message, tool-calling or not.
    #[must_use]
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::ASSISTANT))
    }

    /// The most recent assistant message carrying displayable text, scoped
    /// to messages produced after the newest user message.
    ///
    /// This is the reply the lifecycle manager extracts at the end of a
    /// turn; tool-calling assistant messages are skipped, and loaded
    /// history is never served as this turn's answer.
    #[must_use]
    pub fn final_reply(&self) -> Option<&Message> {
        let start = self
            .messages
            .iter()
            .rposition(|m| m.has_role(Message::USER))
            .map_or(0, |i| i + 1);
        self.messages[start..].iter().rev().find(|m| m.is_displayable_text())
    }
}

impl TurnSnapshot {
    /// Messages produced after the newest user message, oldest first.
    ///
    /// The newest user message is the one that started this turn, so this
    /// slice holds only the turn's own additions. Everything before it is
    /// loaded history.
    #[must_use]
    pub fn current_turn(&self) -> &[Message] {
        let start = self
            .messages
            .iter()
            .rposition(|m| m.has_role(Message::USER))
            .map_or(0, |i| i + 1);
        &self.messages[start..]
    }

    /// The most recent assistant message produced during this turn.
    ///
    /// Assistant messages in loaded history never count.
    #[must_use]
    pub fn turn_assistant(&self) -> Option<&Message> {
        self.current_turn()
            .iter()
            .rev()
            .find(|m| m.has_role(Message::ASSISTANT))
    }

    /// The most recent user message, if any.
    #[must_use]
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_role(Message::USER))
    }

    /// The most recent assistant message, if any.
    #[must_use]
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::ASSISTANT))
    }
}

/// Builder for constructing a [`TurnState`] with fluent API.
#[derive(Debug, Default)]
pub struct TurnStateBuilder {
    messages: Vec<Message>,
    user_id: Option<String>,
    conversation_id: String,
    persona: Option<String>,
    model_name: Option<String>,
    summary: Option<String>,
}

impl TurnStateBuilder {
    fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Default::default()
        }
    }

    /// Sets the requesting user. Absent ids resolve to the anonymous sentinel.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Seeds the turn with prior history, oldest first.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.messages = history;
        self
    }

    /// Appends a user message.
    #[must_use]
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Appends an assistant message.
    #[must_use]
    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    /// Sets the persona text for worker prompts.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Sets a model override for provider calls.
    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Sets the rolling summary of older history.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builds the final [`TurnState`].
    pub fn build(self) -> TurnState {
        TurnState {
            messages: self.messages,
            user_id: self
                .user_id
                .unwrap_or_else(|| TurnState::ANONYMOUS_USER.to_string()),
            conversation_id: self.conversation_id,
            persona: self.persona,
            model_name: self.model_name,
            summary: self.summary,
            next: RouteTarget::default(),
            usage: TokenUsage::default(),
            errors: Vec::new(),
        }
    }
}
