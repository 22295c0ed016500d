//! Record storage behind the search and fetch tools.

use std::collections::HashMap;
use std::path::Path;

use crate::error::RecordError;
use crate::models::Record;

/// Read-only lookup over the searchable records.
pub trait RecordStore: Send + Sync {
    /// All records, in file order.
    fn all(&self) -> &[Record];

    /// A single record by ID.
    fn get(&self, id: &str) -> Option<&Record>;
}

/// Records loaded once from a JSON array.
#[derive(Debug, Clone, Default)]
pub struct JsonRecordStore {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl JsonRecordStore {
    /// Build a store from records already in memory. Later duplicates of an ID
    /// win lookups.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        let index = records.iter().enumerate().map(|(i, r)| (r.id.clone(), i)).collect();
        Self { records, index }
    }

    /// Parse a JSON array of records.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(Self::from_records(serde_json::from_str(json)?))
    }

    /// Load a JSON array of records from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| RecordError::Io { path: path.to_path_buf(), source })?;
        let store = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), count = store.len(), "Loaded records");
        Ok(store)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for JsonRecordStore {
    fn all(&self) -> &[Record] {
        &self.records
    }

    fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&i| &self.records[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_and_lookup() {
        let store = JsonRecordStore::from_json(
            r#"[{"id": "1", "title": "Lemon"}, {"id": "2", "title": "Mocha"}]"#,
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("2").unwrap().title, "Mocha");
        assert!(store.get("3").is_none());
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let store = JsonRecordStore::from_json(
            r#"[{"id": "1", "title": "First"}, {"id": "1", "title": "Second"}]"#,
        )
        .unwrap();
        assert_eq!(store.get("1").unwrap().title, "Second");
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(JsonRecordStore::from_json("{}"), Err(RecordError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = JsonRecordStore::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, RecordError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
