//! On-disk document format for stored entries.
//!
//! Each entry is a JSON document holding the logical key next to its value,
//! so the store can enumerate keys without a separate index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored key-value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// The logical key the caller used.
    pub key: String,

    /// The stored payload.
    pub value: Value,
}

impl StoredEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_document_shape() {
        let entry = StoredEntry::new("order", json!(["a", "b"]));
        let doc = serde_json::to_value(&entry).unwrap();
        assert_eq!(doc, json!({ "key": "order", "value": ["a", "b"] }));
    }
}
