//! Index entries moved through the exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One scan result produced by an index.
///
/// Entries are value-like and owned by whoever holds the slot: the producer
/// until it is sent, the exchange while queued, the consumer once received.
/// `Clone` is a deep copy, for consumers that keep entries beyond the scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Document key
    pub primary_key: String,
    /// Index key values, in index key order (empty for primary scans)
    #[serde(default)]
    pub entry_key: Vec<Value>,
    /// Optional metadata attached by the index
    #[serde(default)]
    pub meta_data: Option<Value>,
}

impl IndexEntry {
    /// Create an entry carrying only a document key.
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            entry_key: Vec::new(),
            meta_data: None,
        }
    }

    /// Builder-style: set the index key values.
    pub fn with_entry_key(mut self, entry_key: Vec<Value>) -> Self {
        self.entry_key = entry_key;
        self
    }

    /// Builder-style: set metadata.
    pub fn with_meta_data(mut self, meta_data: Value) -> Self {
        self.meta_data = Some(meta_data);
        self
    }

    /// Approximate size of this entry in bytes.
    pub fn size_bytes(&self) -> usize {
        let values: usize = self.entry_key.iter().map(value_size).sum();
        self.primary_key.len() + values + self.meta_data.as_ref().map_or(0, value_size)
    }
}

fn value_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(value_size).sum(),
        Value::Object(map) => map.iter().map(|(k, v)| k.len() + value_size(v)).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_is_deep() {
        let original = IndexEntry::new("doc-1")
            .with_entry_key(vec![json!("a"), json!([1, 2])])
            .with_meta_data(json!({"cas": 7}));

        let mut copy = original.clone();
        copy.entry_key[1] = json!([3]);
        copy.meta_data = None;

        assert_eq!(original.entry_key[1], json!([1, 2]));
        assert_eq!(original.meta_data, Some(json!({"cas": 7})));
    }

    #[test]
    fn test_size_bytes() {
        assert_eq!(IndexEntry::new("abc").size_bytes(), 3);

        let entry = IndexEntry::new("k").with_entry_key(vec![json!("xy"), json!(1)]);
        assert_eq!(entry.size_bytes(), 1 + 2 + 8);
    }

    #[test]
    fn test_deserialize_defaults() {
        let entry: IndexEntry = serde_json::from_str(r#"{"primary_key": "k1"}"#).unwrap();
        assert_eq!(entry, IndexEntry::new("k1"));
    }
}
