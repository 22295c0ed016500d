//! Tests for the search and fetch tools over a JSON record file.

use std::sync::Arc;

use serde_json::{Value, json};

use cupcake_mcp::error::ToolError;
use cupcake_mcp::tools::{FetchTool, McpTool, SearchTool, ToolContext};
use cupcake_mcp::{JsonRecordStore, RecordStore};

const RECORDS: &str = r#"[
    {
        "id": "ord-1001",
        "title": "Red Velvet Dozen",
        "text": "Twelve red velvet cupcakes with cream cheese frosting.",
        "url": "https://cupcake.test/orders/1001",
        "metadata": {"customer": "Ada Lovelace", "status": "delivered"}
    },
    {
        "id": "ord-1002",
        "title": "Lemon Six-Pack",
        "text": "Six lemon cupcakes, gluten free.",
        "metadata": {"customer": "Grace Hopper", "status": "pending"}
    },
    {
        "id": "ord-1003",
        "title": "Chocolate Tower",
        "text": "Forty-eight chocolate cupcakes for a wedding."
    }
]"#;

fn ctx() -> ToolContext {
    ToolContext::new(Arc::new(JsonRecordStore::from_json(RECORDS).unwrap()))
}

async fn search(query: &str) -> Vec<String> {
    let text = SearchTool.execute(&ctx(), json!({"query": query})).await.unwrap();
    let page: Value = serde_json::from_str(&text).unwrap();
    page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_search_matches_title_case_insensitively() {
    assert_eq!(search("velvet").await, vec!["ord-1001"]);
    assert_eq!(search("CHOCOLATE").await, vec!["ord-1003"]);
}

#[tokio::test]
async fn test_search_matches_metadata_values() {
    assert_eq!(search("hopper").await, vec!["ord-1002"]);
    assert_eq!(search("delivered").await, vec!["ord-1001"]);
}

#[tokio::test]
async fn test_search_any_token_in_record_order() {
    assert_eq!(search("wedding lemon").await, vec!["ord-1002", "ord-1003"]);
    assert_eq!(search("cupcakes").await, vec!["ord-1001", "ord-1002", "ord-1003"]);
}

#[tokio::test]
async fn test_search_partial_token_is_substring() {
    assert_eq!(search("choc").await, vec!["ord-1003"]);
}

#[tokio::test]
async fn test_search_empty_and_missing_query() {
    assert!(search("").await.is_empty());
    assert!(search("pistachio").await.is_empty());

    let err = SearchTool.execute(&ctx(), json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::Serialization(_)));
}

#[tokio::test]
async fn test_search_result_shape() {
    let text = SearchTool.execute(&ctx(), json!({"query": "lemon"})).await.unwrap();
    let page: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        page,
        json!({"results": [{
            "id": "ord-1002",
            "title": "Lemon Six-Pack",
            "text": "Six lemon cupcakes, gluten free."
        }]})
    );
}

#[tokio::test]
async fn test_fetch_full_record() {
    let text = FetchTool.execute(&ctx(), json!({"id": "ord-1001"})).await.unwrap();
    let record: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(record["title"], "Red Velvet Dozen");
    assert_eq!(record["url"], "https://cupcake.test/orders/1001");
    assert_eq!(record["metadata"]["customer"], "Ada Lovelace");
}

#[tokio::test]
async fn test_fetch_sparse_record_has_null_optionals() {
    let text = FetchTool.execute(&ctx(), json!({"id": "ord-1003"})).await.unwrap();
    let record: Value = serde_json::from_str(&text).unwrap();
    assert!(record["url"].is_null());
    assert!(record["metadata"].is_null());
}

#[tokio::test]
async fn test_fetch_unknown_id() {
    let err = FetchTool.execute(&ctx(), json!({"id": "ord-9999"})).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(ref id) if id == "ord-9999"));
    assert_eq!(err.to_string(), "unknown id: ord-9999");
}

#[tokio::test]
async fn test_fetch_blank_id() {
    let err = FetchTool.execute(&ctx(), json!({"id": "  "})).await.unwrap_err();
    assert!(matches!(err, ToolError::Validation { .. }));
}

#[test]
fn test_store_loads_from_disk() {
    let path = std::env::temp_dir().join(format!("cupcake-records-{}.json", std::process::id()));
    std::fs::write(&path, RECORDS).unwrap();

    let store = JsonRecordStore::from_path(&path).unwrap();
    assert_eq!(store.all().len(), 3);
    assert_eq!(store.get("ord-1002").unwrap().title, "Lemon Six-Pack");

    std::fs::remove_file(&path).unwrap();
}
