//! Tool trait and registry.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::Arc;

use super::llm::ToolSpec;
use super::ProviderError;

/// An invocable capability exposed to the research worker.
///
/// # Examples
///
/// ```
/// use colloquy::providers::Tool;
/// use colloquy::providers::ProviderError;
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct WordCount;
///
/// #[async_trait]
/// impl Tool for WordCount {
///     fn name(&self) -> &str { "word_count" }
///     fn description(&self) -> &str { "Counts words in a text." }
///     async fn call(&self, arguments: Value) -> Result<Value, ProviderError> {
///         let text = arguments["text"].as_str().unwrap_or_default();
///         Ok(json!({"words": text.split_whitespace().count()}))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to address this tool.
    fn name(&self) -> &str;

    /// Human-readable capability description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema for this tool's arguments.
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    /// Execute the tool with structured arguments.
    async fn call(&self, arguments: Value) -> Result<Value, ProviderError>;
}

/// Registry of tools available within a conversation graph.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its own name. Re-registering a name replaces
    /// the previous tool.
    #[must_use]
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Specs for every registered tool, for inclusion in a chat request.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        // Stable ordering keeps prompts reproducible across runs.
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
