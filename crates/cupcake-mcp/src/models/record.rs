//! Cupcake order records and the shapes the tools return.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One searchable record, as stored in the records file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record ID.
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Free-form string attributes (flavor, customer, status, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Record {
    /// Lowercased title, text and metadata values joined by spaces.
    #[must_use]
    pub fn haystack(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.text.as_str()];
        if let Some(metadata) = &self.metadata {
            parts.extend(metadata.values().map(String::as_str));
        }
        parts.join(" ").to_lowercase()
    }

    /// True if any of the (already lowercased) tokens occurs in the haystack.
    #[must_use]
    pub fn matches_any(&self, tokens: &[String]) -> bool {
        let haystack = self.haystack();
        tokens.iter().any(|t| haystack.contains(t.as_str()))
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl From<&Record> for SearchResult {
    fn from(record: &Record) -> Self {
        Self { id: record.id.clone(), title: record.title.clone(), text: record.text.clone() }
    }
}

/// All hits for one query, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub results: Vec<SearchResult>,
}

/// A full record returned by `fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl From<Record> for FetchResult {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            title: record.title,
            text: record.text,
            url: record.url,
            metadata: record.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        serde_json::from_value(serde_json::json!({
            "id": "1",
            "title": "Red Velvet Dozen",
            "text": "Twelve cupcakes for a birthday",
            "metadata": {"customer": "Ada Lovelace", "status": "Delivered"}
        }))
        .unwrap()
    }

    #[test]
    fn test_sparse_record_loads() {
        let r: Record = serde_json::from_value(serde_json::json!({"id": "x"})).unwrap();
        assert_eq!(r.title, "");
        assert!(r.metadata.is_none());
    }

    #[test]
    fn test_haystack_includes_metadata_values() {
        let haystack = record().haystack();
        assert!(haystack.contains("red velvet"));
        assert!(haystack.contains("ada lovelace"));
        assert!(!haystack.contains("customer"));
    }

    #[test]
    fn test_matches_any() {
        let r = record();
        assert!(r.matches_any(&["chocolate".into(), "delivered".into()]));
        assert!(!r.matches_any(&["chocolate".into()]));
        assert!(!r.matches_any(&[]));
    }
}
