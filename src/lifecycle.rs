//! Per-room turn lifecycle: load, run, persist, summarize.
//!
//! [`ConversationManager`] owns the pipeline around graph execution. A
//! per-room async lock serializes turns so concurrent requests for the same
//! room never interleave their history reads and writes; different rooms
//! proceed in parallel.
//!
//! Degradation order matters here. Failing to load history fails the turn,
//! because running without context would silently produce wrong answers.
//! Everything after execution is best-effort: the user gets their reply even
//! when persistence or summarization fails.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::errors::ErrorEvent;
use crate::executor::{Executor, ExecutorError, StepDelta, TurnStream};
use crate::message::Message;
use crate::nodes::DEGRADED_REPLY;
use crate::providers::{
    ChatRequest, ConversationEntry, ConversationStore, LanguageModel, ProviderError, RoomHistory,
};
use crate::state::{TokenUsage, TurnState};

/// Fatal lifecycle failures.
#[derive(Debug, Error, Diagnostic)]
pub enum LifecycleError {
    #[error("failed to load history for room {room_id}: {source}")]
    #[diagnostic(code(colloquy::lifecycle::history_load))]
    HistoryLoad {
        room_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("streaming turn task failed to join")]
    #[diagnostic(code(colloquy::lifecycle::join))]
    Join(#[from] tokio::task::JoinError),
}

/// One incoming user message for a room.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub room_id: String,
    pub text: String,
    pub user_id: Option<String>,
    pub persona: Option<String>,
    pub model_name: Option<String>,
}

impl TurnRequest {
    pub fn new(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            text: text.into(),
            user_id: None,
            persona: None,
            model_name: None,
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }
}

/// What a completed turn produced.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The reply to show the user.
    pub reply: String,
    /// Token usage accumulated by worker calls this turn.
    pub usage: TokenUsage,
    /// Recoverable errors observed during the turn.
    pub errors: Vec<ErrorEvent>,
    /// Whether the turn reached durable storage.
    pub persisted: bool,
    /// Whether this turn triggered a summary rewrite.
    pub summarized: bool,
}

/// Orchestrates conversation turns end to end.
pub struct ConversationManager {
    executor: Executor,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn ConversationStore>,
    config: OrchestratorConfig,
    room_locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(
        executor: Executor,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn ConversationStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let executor = executor.with_step_limit(config.step_limit);
        Self {
            executor,
            model,
            store,
            config,
            room_locks: Mutex::new(FxHashMap::default()),
        }
    }

    /// The lock serializing turns for one room.
    async fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.room_locks.lock().await;
        Arc::clone(locks.entry(room_id.to_string()).or_default())
    }

    /// Drops a room's lock entry once no turn holds it, so the map does not
    /// grow by one entry per room forever.
    async fn evict_room_lock(&self, room_id: &str) {
        let mut locks = self.room_locks.lock().await;
        let idle = locks
            .get(room_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(room_id);
        }
    }

    /// Handles one turn to completion and returns the reply.
    #[instrument(skip(self, request), fields(room_id = %request.room_id))]
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, LifecycleError> {
        let room_id = request.room_id.clone();
        let lock = self.room_lock(&room_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.run_turn(request, None).await
        };
        drop(lock);
        self.evict_room_lock(&room_id).await;
        outcome
    }

    /// Handles one turn on a background task, streaming one [`StepDelta`]
    /// per completed node.
    ///
    /// The room lock is taken inside the task, so queued turns for the same
    /// room wait their turn. Dropping the stream does not cancel the run.
    pub fn handle_turn_streaming(
        self: Arc<Self>,
        request: TurnRequest,
    ) -> (
        tokio::task::JoinHandle<Result<TurnOutcome, LifecycleError>>,
        TurnStream,
    ) {
        let (tx, rx) = flume::unbounded();
        let join = tokio::spawn(async move {
            let room_id = request.room_id.clone();
            let lock = self.room_lock(&room_id).await;
            let outcome = {
                let _guard = lock.lock_owned().await;
                self.run_turn(request, Some(tx)).await
            };
            self.evict_room_lock(&room_id).await;
            outcome
        });
        (join, TurnStream::new(rx))
    }

    async fn run_turn(
        &self,
        request: TurnRequest,
        delta_tx: Option<flume::Sender<StepDelta>>,
    ) -> Result<TurnOutcome, LifecycleError> {
        let history = self
            .store
            .load_recent(&request.room_id, self.config.history_window)
            .await
            .map_err(|source| LifecycleError::HistoryLoad {
                room_id: request.room_id.clone(),
                source,
            })?;

        let mut builder = TurnState::builder(&request.room_id)
            .with_history(history.entries.iter().map(ConversationEntry::to_message).collect())
            .with_user_message(&request.text);
        if let Some(user_id) = &request.user_id {
            builder = builder.with_user_id(user_id);
        }
        if let Some(persona) = &request.persona {
            builder = builder.with_persona(persona);
        }
        if let Some(model_name) = &request.model_name {
            builder = builder.with_model_name(model_name);
        }
        if let Some(summary) = &history.summary {
            builder = builder.with_summary(summary);
        }
        let state = builder.build();
        let user_id = state.user_id.clone();

        // Execution failure degrades to an apology rather than failing the
        // turn; the user message is still worth persisting.
        let (reply, reply_model, usage, mut errors) =
            match self.executor.invoke_observed(state, delta_tx).await {
                Ok(final_state) => {
                    let (reply, reply_model) = match final_state.final_reply() {
                        Some(message) => (message.content.clone(), message.model.clone()),
                        None => (DEGRADED_REPLY.to_string(), None),
                    };
                    (reply, reply_model, final_state.usage, final_state.errors)
                }
                Err(error) => {
                    tracing::error!(room_id = %request.room_id, %error, "turn execution failed");
                    let event = ErrorEvent::executor(step_of(&error), error.to_string());
                    (
                        DEGRADED_REPLY.to_string(),
                        None,
                        TokenUsage::default(),
                        vec![event],
                    )
                }
            };

        let user_entry = ConversationEntry::user(&request.text).with_user(&user_id);
        let mut assistant_entry = ConversationEntry::assistant(&reply)
            .with_user(&user_id)
            .with_usage(usage);
        // Prefer the model the provider reported over the requested
        // override, which a hybrid provider may not have honored.
        if let Some(model_name) = reply_model.as_ref().or(request.model_name.as_ref()) {
            assistant_entry = assistant_entry.with_model(model_name);
        }

        let persisted = match self
            .store
            .append_turn(&request.room_id, user_entry, assistant_entry)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(room_id = %request.room_id, %error, "failed to persist turn");
                errors.push(ErrorEvent::lifecycle(
                    &request.room_id,
                    format!("failed to persist turn: {error}"),
                ));
                false
            }
        };

        let summarized = if persisted {
            self.maybe_summarize(&request.room_id, &history, &request.text, &reply)
                .await
        } else {
            false
        };

        Ok(TurnOutcome {
            reply,
            usage,
            errors,
            persisted,
            summarized,
        })
    }

    /// Folds older history into the rolling summary when the room has grown
    /// past the threshold. Failures are swallowed; summarization is an
    /// optimization, never a reason to fail a served turn.
    async fn maybe_summarize(
        &self,
        room_id: &str,
        prior: &RoomHistory,
        user_text: &str,
        reply: &str,
    ) -> bool {
        let total_entries = prior.entries.len() + 2;
        if total_entries < self.config.summary_threshold {
            return false;
        }

        let mut entries: Vec<(String, String)> = prior
            .entries
            .iter()
            .map(|e| (e.role.clone(), e.content.clone()))
            .collect();
        entries.push((Message::USER.to_string(), user_text.to_string()));
        entries.push((Message::ASSISTANT.to_string(), reply.to_string()));

        let fold_until = entries.len().saturating_sub(self.config.summary_keep_recent);
        let mut transcript = String::new();
        for (role, content) in &entries[..fold_until] {
            transcript.push_str(&format!("{role}: {content}\n"));
        }

        let mut prompt = String::from(
            "Condense the conversation below into a short summary that preserves names, \
             decisions, and open questions. Reply with the summary text only.",
        );
        if let Some(previous) = &prior.summary {
            prompt.push_str("\n\nFold in this existing summary of even earlier history:\n");
            prompt.push_str(previous);
        }

        let request = ChatRequest::new(vec![Message::user(&transcript)]).with_system(prompt);
        let response = match self.model.generate(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(room_id, %error, "summarization call failed; keeping old summary");
                return false;
            }
        };
        tracing::info!(
            room_id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "summarization usage"
        );

        match self
            .store
            .update_summary(room_id, &response.message.content)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(room_id, %error, "failed to store updated summary");
                false
            }
        }
    }
}

fn step_of(error: &ExecutorError) -> u64 {
    match error {
        ExecutorError::StepLimitExceeded { limit } => *limit,
        _ => 0,
    }
}

/// Generates a fresh room id for callers starting a new conversation.
#[must_use]
pub fn new_room_id() -> String {
    Uuid::new_v4().to_string()
}
