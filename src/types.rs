//! Core identity types for the conversation graph.
//!
//! This module defines the fundamental types used throughout the crate for
//! identifying nodes, state channels, and routing decisions:
//!
//! - [`NodeKind`]: Identifies nodes in the conversation graph
//! - [`ChannelType`]: Identifies state channels with distinct merge policies
//! - [`RouteTarget`]: The supervisor's routing decision

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within the conversation graph.
///
/// `Start` and `End` are virtual endpoints: they are never registered as
/// executable nodes and exist only for topology. Every graph's first edge
/// originates at the virtual `Start` node, and routing to `End` terminates
/// the turn.
///
/// # Examples
///
/// ```
/// use colloquy::types::NodeKind;
///
/// let supervisor = NodeKind::Custom("supervisor".to_string());
/// assert_eq!(supervisor.encode(), "Custom:supervisor");
/// assert_eq!(NodeKind::decode("Custom:supervisor"), supervisor);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point. Has no implementation and no incoming edges.
    Start,
    /// Virtual terminal. Has no implementation and no outgoing edges.
    End,
    /// An executable node identified by a user-defined name.
    Custom(String),
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Unrecognized formats fall back to `Custom(s)` for forward
    /// compatibility.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is the virtual [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` if this is an executable custom node.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

// Allow using string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// The supervisor's routing decision for the current turn.
///
/// Only the router writes this channel; every other node leaves it
/// untouched (workers may force [`Finish`](Self::Finish) when degrading
/// after a provider failure, which is itself a terminal routing decision).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteTarget {
    /// Route to the named worker node next.
    Worker(String),
    /// Terminate the turn.
    Finish,
}

impl RouteTarget {
    /// The sentinel the routing model emits to terminate a turn.
    pub const FINISH: &'static str = "FINISH";

    /// Creates a worker route.
    #[must_use]
    pub fn worker(name: impl Into<String>) -> Self {
        Self::Worker(name.into())
    }

    /// Returns `true` if this decision terminates the turn.
    #[must_use]
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish)
    }

    /// Parses a routing token: the [`FINISH`](Self::FINISH) sentinel or a
    /// worker name.
    pub fn parse(s: &str) -> Self {
        if s == Self::FINISH {
            Self::Finish
        } else {
            Self::Worker(s.to_string())
        }
    }
}

impl Default for RouteTarget {
    fn default() -> Self {
        Self::Finish
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker(name) => write!(f, "{}", name),
            Self::Finish => write!(f, "{}", Self::FINISH),
        }
    }
}

/// Identifies a state channel with its own merge policy.
///
/// Each channel has exactly one reducer semantics: messages append (with
/// identity replacement), the route target is overwritten, token usage
/// accumulates, and errors append.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Conversation messages. Append with replace-by-id.
    Messages,
    /// The supervisor's routing decision. Last write wins.
    Next,
    /// Token usage counters. Deltas accumulate.
    Usage,
    /// Recoverable error events. Append only.
    Errors,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages => write!(f, "messages"),
            Self::Next => write!(f, "next"),
            Self::Usage => write!(f, "usage"),
            Self::Errors => write!(f, "errors"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_encode_decode_roundtrip() {
        let kinds = [
            NodeKind::Start,
            NodeKind::End,
            NodeKind::Custom("supervisor".into()),
        ];
        for kind in kinds {
            assert_eq!(NodeKind::decode(&kind.encode()), kind);
        }
    }

    #[test]
    fn test_node_kind_decode_forward_compat() {
        assert_eq!(
            NodeKind::decode("researcher"),
            NodeKind::Custom("researcher".into())
        );
    }

    #[test]
    fn test_node_kind_from_str() {
        assert_eq!(NodeKind::from("Start"), NodeKind::Start);
        assert_eq!(NodeKind::from("End"), NodeKind::End);
        assert_eq!(
            NodeKind::from("general_assistant"),
            NodeKind::Custom("general_assistant".into())
        );
    }

    #[test]
    fn test_route_target_parse() {
        assert_eq!(RouteTarget::parse("FINISH"), RouteTarget::Finish);
        assert_eq!(
            RouteTarget::parse("researcher"),
            RouteTarget::Worker("researcher".into())
        );
    }

    #[test]
    fn test_route_target_display() {
        assert_eq!(RouteTarget::Finish.to_string(), "FINISH");
        assert_eq!(RouteTarget::worker("knowledge_search").to_string(), "knowledge_search");
    }
}
