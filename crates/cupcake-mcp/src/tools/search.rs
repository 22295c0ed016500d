//! Keyword search over cupcake order records.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::ToolResult;
use crate::models::{SearchInput, SearchResult, SearchResultPage};
use crate::records::RecordStore;

/// Return every record where any query token appears in its title, text or
/// metadata values. Matching is case-insensitive; an empty query matches
/// nothing.
#[must_use]
pub fn search_records(store: &dyn RecordStore, query: &str) -> SearchResultPage {
    let tokens: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_owned).collect();
    if tokens.is_empty() {
        return SearchResultPage::default();
    }

    let results = store
        .all()
        .iter()
        .filter(|record| record.matches_any(&tokens))
        .map(SearchResult::from)
        .collect();
    SearchResultPage { results }
}

/// Keyword search tool.
pub struct SearchTool;

#[async_trait::async_trait]
impl McpTool for SearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Search cupcake orders by keyword. Returns matching records with id, title and text; \
         use fetch with an id to retrieve the full record."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords (e.g., 'red velvet birthday')"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: SearchInput = serde_json::from_value(input)?;
        let page = search_records(ctx.records.as_ref(), &params.query);
        tracing::debug!(query = %params.query, hits = page.results.len(), "search");
        Ok(serde_json::to_string(&page)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::records::JsonRecordStore;

    fn store() -> JsonRecordStore {
        JsonRecordStore::from_records(vec![
            Record { id: "1".into(), title: "Lemon Drizzle".into(), text: "Six lemon cupcakes".into(), ..Record::default() },
            Record { id: "2".into(), title: "Mocha Box".into(), text: "Coffee frosting".into(), ..Record::default() },
        ])
    }

    #[test]
    fn test_any_token_matches() {
        let page = search_records(&store(), "LEMON coffee");
        let ids: Vec<_> = page.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        assert!(search_records(&store(), "   ").results.is_empty());
    }

    #[test]
    fn test_no_hits() {
        assert!(search_records(&store(), "pistachio").results.is_empty());
    }
}
