//! Input models for MCP tool parameters.

use serde::{Deserialize, Serialize};

/// Input for the `search` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchInput {
    /// Free-text query; any whitespace-separated token may match.
    pub query: String,
}

/// Input for the `fetch` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInput {
    /// Record identifier.
    pub id: String,
}
