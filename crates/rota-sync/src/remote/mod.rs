//! Remote document store abstraction.
//!
//! The remote side is a document database organised in collections of JSON
//! documents keyed by the decimal rendering of the record id. Every accepted
//! write is stamped with a server-assigned modification time.

mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::flexible;

pub use memory::{MemoryRemoteStore, QueryRecord};

/// A remote document body.
pub type Document = serde_json::Map<String, Value>;

/// Field the remote store stamps on every accepted write (epoch ms).
pub const SERVER_TIMESTAMP_FIELD: &str = "last_modified";

/// A document as returned by a remote query.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// Document key
    pub id: String,
    pub data: Document,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Server-assigned modification time, when present.
    #[must_use]
    pub fn modified_at(&self) -> Option<i64> {
        self.data
            .get(SERVER_TIMESTAMP_FIELD)
            .and_then(flexible::value_to_millis)
    }

    /// Approximate wire size, for transfer diagnostics.
    #[must_use]
    pub fn approx_bytes(&self) -> u64 {
        serde_json::to_vec(&self.data).map_or(0, |bytes| bytes.len() as u64) + self.id.len() as u64
    }
}

/// Query restriction on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn one_of(field: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Value::from).collect(),
        }
    }

    /// Whether a document (with key `id`) satisfies this filter.
    ///
    /// Numbers and numeric strings compare equal, since older clients wrote
    /// foreign keys as strings.
    #[must_use]
    pub fn matches(&self, id: &str, data: &Document) -> bool {
        match self {
            Self::Equals { field, value } => field_value(id, data, field)
                .is_some_and(|actual| loosely_equal(&actual, value)),
            Self::In { field, values } => field_value(id, data, field)
                .is_some_and(|actual| values.iter().any(|value| loosely_equal(&actual, value))),
        }
    }
}

fn field_value(id: &str, data: &Document, field: &str) -> Option<Value> {
    match data.get(field) {
        Some(value) => Some(value.clone()),
        None if field == "id" => Some(Value::String(id.to_string())),
        None => None,
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (flexible::value_to_i64(left), flexible::value_to_i64(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Shared remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every document of a collection, optionally filtered.
    async fn get_all(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<RemoteDocument>>;

    /// Documents whose server timestamp is strictly greater than `since`.
    async fn get_modified_since(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
        since: i64,
    ) -> Result<Vec<RemoteDocument>>;

    /// Documents whose `field` equals `value`.
    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<RemoteDocument>>;

    /// Create or replace a document and return the server timestamp stamped
    /// on it.
    async fn upsert(&self, collection: &str, id: &str, document: Document) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_matches_numeric_strings() {
        let filter = FieldFilter::one_of("route_id", [1, 2]);
        assert!(filter.matches("10", &doc(json!({"route_id": "2"}))));
        assert!(!filter.matches("11", &doc(json!({"route_id": 3}))));
        assert!(!filter.matches("12", &doc(json!({"name": "no route"}))));
    }

    #[test]
    fn id_filter_falls_back_to_document_key() {
        let filter = FieldFilter::equals("id", 7);
        assert!(filter.matches("7", &doc(json!({"name": "Centro"}))));
    }

    #[test]
    fn modified_at_reads_server_timestamp() {
        let document = RemoteDocument::new("1", doc(json!({"last_modified": 1_700_000_000_123_i64})));
        assert_eq!(document.modified_at(), Some(1_700_000_000_123));
        assert_eq!(RemoteDocument::new("2", Document::new()).modified_at(), None);
    }
}
