use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single conversation message: user input, assistant output, system
/// instructions, or a tool result.
///
/// Messages are the primary data flowing through a conversation turn. Worker
/// nodes append assistant messages, the tool execution node appends tool
/// results, and the lifecycle manager seeds the turn with history and the
/// new user message.
///
/// # Identity
///
/// `id` is the merge identity used by the message reducer: an incoming
/// message whose id matches an existing message replaces it in place rather
/// than appending. Messages without an id always append. `tool_call_id`
/// additionally correlates a tool result with the assistant tool call that
/// requested it.
///
/// # Examples
///
/// ```
/// use colloquy::message::Message;
///
/// let user = Message::user("What changed in the last release?");
/// let reply = Message::assistant("Three bug fixes and a new config flag.");
/// assert!(user.has_role(Message::USER));
/// assert!(reply.tool_calls.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender. Use the constants on [`Message`]
    /// for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
    /// Merge identity. Matching ids replace in place during reduction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool invocations requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool-result messages: the id of the originating tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For assistant messages: the model that produced this reply, when the
    /// provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A tool invocation requested by an assistant message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id, echoed back on the matching tool-result message.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// Arguments as structured JSON.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a tool call with a fresh correlation id.
    #[must_use]
    pub fn new(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            arguments,
        }
    }
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool result message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            id: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            model: None,
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates an assistant message carrying tool calls.
    ///
    /// Tool-calling assistant messages typically have empty content; the
    /// requested invocations are in `tool_calls`.
    #[must_use]
    pub fn assistant_with_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content: content.to_string(),
            id: None,
            tool_calls,
            tool_call_id: None,
            model: None,
        }
    }

    /// Creates a tool-result message correlated with the originating call.
    ///
    /// # Examples
    /// ```
    /// use colloquy::message::Message;
    ///
    /// let result = Message::tool_result("call_7", "{\"pages\": 3}");
    /// assert!(result.has_role(Message::TOOL));
    /// assert_eq!(result.tool_call_id.as_deref(), Some("call_7"));
    /// ```
    #[must_use]
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: content.to_string(),
            id: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.to_string()),
            model: None,
        }
    }

    /// Assigns a merge identity to this message.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Assigns a freshly generated merge identity to this message.
    #[must_use]
    pub fn with_generated_id(self) -> Self {
        self.with_id(Uuid::new_v4().to_string())
    }

    /// Records the model that produced this message.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns true if this message requests one or more tool invocations.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Returns true if this is an assistant message carrying displayable
    /// text rather than tool activity.
    #[must_use]
    pub fn is_displayable_text(&self) -> bool {
        self.has_role(Self::ASSISTANT) && !self.has_tool_calls() && !self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convenience_constructors() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Message::USER);
        assert_eq!(user_msg.content, "Hello");
        assert!(user_msg.id.is_none());

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Message::ASSISTANT);

        let system_msg = Message::system("You are helpful");
        assert_eq!(system_msg.role, Message::SYSTEM);

        let tool_msg = Message::tool_result("call_1", "42");
        assert_eq!(tool_msg.role, Message::TOOL);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_tool_call_carrier() {
        let call = ToolCall::new("web_search", json!({"query": "rust 2024 edition"}));
        assert!(!call.id.is_empty());

        let msg = Message::assistant_with_calls("", vec![call.clone()]);
        assert!(msg.has_tool_calls());
        assert!(!msg.is_displayable_text());
        assert_eq!(msg.tool_calls[0].name, "web_search");
    }

    #[test]
    fn test_displayable_text_classification() {
        assert!(Message::assistant("plain answer").is_displayable_text());
        assert!(!Message::assistant("").is_displayable_text());
        assert!(!Message::user("question").is_displayable_text());
        assert!(!Message::tool_result("c1", "data").is_displayable_text());
    }

    #[test]
    fn test_identity_assignment() {
        let msg = Message::assistant("draft").with_id("m-1");
        assert_eq!(msg.id.as_deref(), Some("m-1"));

        let generated = Message::assistant("draft").with_generated_id();
        assert!(generated.id.is_some());
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let msg = Message::user("test");
        let json = serde_json::to_string(&msg).expect("serialization failed");
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));

        let parsed: Message = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(msg, parsed);
    }

    #[test]
    fn test_roundtrip_with_tool_calls() {
        let original = Message::assistant_with_calls(
            "",
            vec![ToolCall::new("lookup", json!({"key": "v"}))],
        );
        let json = serde_json::to_string(&original).expect("serialization failed");
        let parsed: Message = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(original, parsed);
    }
}
