//! MCP tool implementations.
//!
//! Each tool parses its JSON input, runs against the record store and
//! returns the result serialized as JSON text.

mod fetch;
mod search;

pub use fetch::FetchTool;
pub use search::{SearchTool, search_records};

use std::sync::Arc;

use crate::error::ToolResult;
use crate::records::RecordStore;

/// Tool execution context.
#[derive(Clone)]
pub struct ToolContext {
    /// Searchable records.
    pub records: Arc<dyn RecordStore>,
}

impl ToolContext {
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").field("records", &self.records.all().len()).finish()
    }
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "search").
    fn name(&self) -> &'static str;

    /// Tool description for LLM.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String>;
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![Box::new(SearchTool), Box::new(FetchTool)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let names: Vec<_> = register_all_tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["search", "fetch"]);
    }

    #[test]
    fn test_schemas_require_their_field() {
        for tool in register_all_tools() {
            let schema = tool.input_schema();
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["required"].as_array().map(Vec::len), Some(1));
        }
    }
}
