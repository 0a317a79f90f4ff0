//! Recoverable error events carried on the turn state's error channel.
//!
//! Fatal failures propagate as typed errors out of the executor or
//! lifecycle manager. Everything else (a provider hiccup inside a worker,
//! a single failed tool call, a malformed routing decision) is recorded
//! here so the turn can degrade gracefully while staying observable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recoverable error observed during a conversation turn.
///
/// # Examples
///
/// ```
/// use colloquy::errors::ErrorEvent;
/// use serde_json::json;
///
/// let event = ErrorEvent::node("researcher", 3, "provider timed out")
///     .with_details(json!({"provider": "chat"}));
/// assert_eq!(event.message, "provider timed out");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ErrorEvent {
    /// Create a node-scoped error event.
    pub fn node<S: Into<String>>(kind: S, step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                kind: kind.into(),
                step,
            },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create a router-scoped error event.
    pub fn router(step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Router { step },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create an executor-scoped error event.
    pub fn executor(step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Executor { step },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Create a lifecycle-scoped error event.
    pub fn lifecycle<S: Into<String>>(room: S, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Lifecycle { room: room.into() },
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach structured context to this error event.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Where in the pipeline an error event originated.
///
/// Serialized as a tagged union with a `"scope"` discriminator so stored
/// events remain queryable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    /// A worker or tool-execution node at a given step.
    Node { kind: String, step: u64 },
    /// The supervisor's routing decision at a given step.
    Router { step: u64 },
    /// The graph executor itself.
    Executor { step: u64 },
    /// The conversation lifecycle manager for a given room.
    Lifecycle { room: String },
}

impl Default for ErrorScope {
    fn default() -> Self {
        ErrorScope::Executor { step: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_serialization_is_tagged() {
        let event = ErrorEvent::node("tools", 2, "unknown tool: frobnicate");
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["scope"]["scope"], "node");
        assert_eq!(value["scope"]["kind"], "tools");
        assert_eq!(value["scope"]["step"], 2);
    }

    #[test]
    fn test_roundtrip_with_details() {
        let original = ErrorEvent::router(1, "malformed decision")
            .with_details(json!({"raw": "go-somewhere"}));
        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: ErrorEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_lifecycle_scope() {
        let event = ErrorEvent::lifecycle("room-9", "persistence failed");
        assert_eq!(
            event.scope,
            ErrorScope::Lifecycle {
                room: "room-9".into()
            }
        );
    }
}
