//! Full-record lookup by ID.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::models::{FetchInput, FetchResult};

/// Record fetch tool.
pub struct FetchTool;

#[async_trait::async_trait]
impl McpTool for FetchTool {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch a full cupcake order record by id, including url and metadata."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Record id returned by search"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: FetchInput = serde_json::from_value(input)?;
        if params.id.trim().is_empty() {
            return Err(ToolError::validation("id", "must not be empty"));
        }

        let record = ctx
            .records
            .get(&params.id)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(params.id.clone()))?;
        Ok(serde_json::to_string(&FetchResult::from(record))?)
    }
}
