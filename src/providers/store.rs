//! Durable conversation storage trait and the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::ProviderError;
use crate::message::Message;
use crate::state::TokenUsage;

/// One durable history entry.
///
/// Token counters are `Option` on purpose: `None` means the provider
/// reported nothing for this entry, which is distinct from a measured zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: String,
    pub content: String,
    /// The user whose turn produced this entry. Both rows of a turn carry
    /// the requesting user, the anonymous sentinel included.
    pub user_id: Option<String>,
    pub model_name: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    /// Creates a user entry. User entries never carry model or usage data.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Message::USER.to_string(),
            content: content.into(),
            user_id: None,
            model_name: None,
            input_tokens: None,
            output_tokens: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an assistant entry.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Message::ASSISTANT.to_string(),
            content: content.into(),
            user_id: None,
            model_name: None,
            input_tokens: None,
            output_tokens: None,
            created_at: Utc::now(),
        }
    }

    /// Records the owning user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Records turn usage. Zero counters persist as absent, preserving the
    /// tracked-vs-untracked distinction.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.input_tokens = (usage.input_tokens > 0).then_some(usage.input_tokens);
        self.output_tokens = (usage.output_tokens > 0).then_some(usage.output_tokens);
        self
    }

    /// Converts this entry into an in-turn message.
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(&self.role, &self.content)
    }
}

/// History loaded for a room at the start of a turn.
#[derive(Clone, Debug, Default)]
pub struct RoomHistory {
    /// Most recent entries, oldest first, bounded by the load window.
    pub entries: Vec<ConversationEntry>,
    /// The room's rolling summary, if one has been written.
    pub summary: Option<String>,
}

/// Durable conversation persistence.
///
/// The lifecycle manager appends exactly one user/assistant pair per
/// successful turn and overwrites the room summary when summarization runs.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Loads the most recent `limit` entries plus the room summary.
    async fn load_recent(&self, room_id: &str, limit: usize)
        -> Result<RoomHistory, ProviderError>;

    /// Appends one completed turn: the user message and the final reply.
    async fn append_turn(
        &self,
        room_id: &str,
        user: ConversationEntry,
        assistant: ConversationEntry,
    ) -> Result<(), ProviderError>;

    /// Overwrites the room's rolling summary.
    async fn update_summary(&self, room_id: &str, summary: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Default)]
struct RoomRecord {
    entries: Vec<ConversationEntry>,
    summary: Option<String>,
}

/// In-memory [`ConversationStore`] for tests and embedded use.
#[derive(Default)]
pub struct MemoryConversationStore {
    rooms: Mutex<FxHashMap<String, RoomRecord>>,
}

impl MemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entry count for a room, for assertions and diagnostics.
    pub async fn entry_count(&self, room_id: &str) -> usize {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .map(|r| r.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load_recent(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<RoomHistory, ProviderError> {
        let rooms = self.rooms.lock().await;
        let Some(record) = rooms.get(room_id) else {
            return Ok(RoomHistory::default());
        };
        let start = record.entries.len().saturating_sub(limit);
        Ok(RoomHistory {
            entries: record.entries[start..].to_vec(),
            summary: record.summary.clone(),
        })
    }

    async fn append_turn(
        &self,
        room_id: &str,
        user: ConversationEntry,
        assistant: ConversationEntry,
    ) -> Result<(), ProviderError> {
        let mut rooms = self.rooms.lock().await;
        let record = rooms.entry(room_id.to_string()).or_default();
        record.entries.push(user);
        record.entries.push(assistant);
        Ok(())
    }

    async fn update_summary(&self, room_id: &str, summary: &str) -> Result<(), ProviderError> {
        let mut rooms = self.rooms.lock().await;
        let record = rooms.entry(room_id.to_string()).or_default();
        record.summary = Some(summary.to_string());
        Ok(())
    }
}
