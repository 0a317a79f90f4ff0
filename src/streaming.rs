//! Client-facing stream shaping.
//!
//! Raw [`StepDelta`]s arrive per completed node, which is too bursty for a
//! chat surface. [`StreamBuffer`] coalesces display text and releases it
//! once enough has accumulated or enough time has passed, whichever comes
//! first. [`display_text`] decides which deltas carry user-visible text at
//! all.

use std::time::Duration;
use tokio::time::Instant;

use crate::executor::StepDelta;

/// Flush thresholds for [`StreamBuffer`].
#[derive(Clone, Copy, Debug)]
pub struct BufferConfig {
    /// Flush when this much time has passed since the last flush.
    pub max_interval: Duration,
    /// Flush when at least this many characters are buffered.
    pub max_chars: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_interval: Duration::from_millis(500),
            max_chars: 50,
        }
    }
}

/// Extracts the user-visible text from a delta, if any.
///
/// Only assistant messages without tool calls are displayable; routing
/// decisions, tool requests, and tool results stay internal.
pub fn display_text(delta: &StepDelta) -> Option<&str> {
    delta
        .messages
        .iter()
        .rev()
        .find(|m| m.is_displayable_text())
        .map(|m| m.content.as_str())
}

/// Coalesces display text into paced chunks.
///
/// Time is measured with [`tokio::time::Instant`], so paused-time tests can
/// drive the interval threshold deterministically.
pub struct StreamBuffer {
    config: BufferConfig,
    buffer: String,
    last_flush: Instant,
}

impl StreamBuffer {
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            last_flush: Instant::now(),
        }
    }

    /// Appends text, returning a chunk when either threshold is crossed.
    pub fn push(&mut self, text: &str) -> Option<String> {
        self.buffer.push_str(text);
        if self.buffer.chars().count() >= self.config.max_chars
            || self.last_flush.elapsed() >= self.config.max_interval
        {
            return self.flush();
        }
        None
    }

    /// Time-based flush for callers polling on an interval.
    pub fn tick(&mut self) -> Option<String> {
        if self.has_content() && self.last_flush.elapsed() >= self.config.max_interval {
            return self.flush();
        }
        None
    }

    /// Unconditionally drains the buffer. Call at end of turn.
    pub fn flush(&mut self) -> Option<String> {
        self.last_flush = Instant::now();
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    /// Returns `true` if undelivered text remains.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StepDelta;
    use crate::message::{Message, ToolCall};
    use crate::types::NodeKind;

    fn delta_with(messages: Vec<Message>) -> StepDelta {
        StepDelta {
            step: 1,
            node: NodeKind::Custom("general_assistant".into()),
            messages,
            next: None,
            usage: None,
            errors: vec![],
        }
    }

    #[test]
    fn test_display_text_skips_tool_traffic() {
        let tool_call = delta_with(vec![Message::assistant_with_calls(
            "",
            vec![ToolCall::new("lookup", serde_json::json!({}))],
        )]);
        assert_eq!(display_text(&tool_call), None);

        let tool_result = delta_with(vec![Message::tool_result("c1", "data")]);
        assert_eq!(display_text(&tool_result), None);

        let reply = delta_with(vec![Message::assistant("hello")]);
        assert_eq!(display_text(&reply), Some("hello"));
    }

    #[test]
    fn test_char_threshold_flushes() {
        let mut buffer = StreamBuffer::new(BufferConfig {
            max_interval: Duration::from_secs(3600),
            max_chars: 10,
        });
        assert_eq!(buffer.push("short"), None);
        assert_eq!(buffer.push(" enough"), Some("short enough".to_string()));
        assert!(!buffer.has_content());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_threshold_flushes_on_tick() {
        let mut buffer = StreamBuffer::new(BufferConfig::default());
        assert_eq!(buffer.push("hi"), None);
        assert_eq!(buffer.tick(), None);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(buffer.tick(), Some("hi".to_string()));
        assert_eq!(buffer.tick(), None);
    }

    #[test]
    fn test_final_flush_drains_everything() {
        let mut buffer = StreamBuffer::new(BufferConfig::default());
        buffer.push("tail");
        assert_eq!(buffer.flush(), Some("tail".to_string()));
        assert_eq!(buffer.flush(), None);
    }
}
