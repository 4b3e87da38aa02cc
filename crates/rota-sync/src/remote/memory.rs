//! In-process remote document store.
//!
//! Several devices in the same process can share one `MemoryRemoteStore`
//! (wrap it in an `Arc`), which makes multi-device scenarios testable without
//! a network.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Document, FieldFilter, RemoteDocument, RemoteStore, SERVER_TIMESTAMP_FIELD};
use crate::error::{Error, Result};
use crate::sync::{Clock, SystemClock};

/// A query issued against the store, recorded for inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRecord {
    All {
        collection: String,
        filter: Option<FieldFilter>,
    },
    ModifiedSince {
        collection: String,
        filter: Option<FieldFilter>,
        since: i64,
    },
    Where {
        collection: String,
        field: String,
    },
}

impl QueryRecord {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::All { collection, .. }
            | Self::ModifiedSince { collection, .. }
            | Self::Where { collection, .. } => collection,
        }
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::All { .. })
    }
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    last_stamp: i64,
    queries: Vec<QueryRecord>,
    writes: usize,
    unavailable: BTreeSet<String>,
}

pub struct MemoryRemoteStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    fail_incremental: AtomicBool,
    fail_all: AtomicBool,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            fail_incremental: AtomicBool::new(false),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Make `get_modified_since` fail, as when an index is missing.
    pub fn fail_incremental_queries(&self, fail: bool) {
        self.fail_incremental.store(fail, Ordering::SeqCst);
    }

    /// Make every query and write fail.
    pub fn fail_everything(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make every query on `collection` fail.
    pub async fn fail_collection(&self, collection: &str, fail: bool) {
        let mut state = self.state.lock().await;
        if fail {
            state.unavailable.insert(collection.to_string());
        } else {
            state.unavailable.remove(collection);
        }
    }

    /// Store a document as-is, without stamping it. Used to seed legacy data.
    pub async fn insert_raw(&self, collection: &str, id: &str, document: Document) {
        let mut state = self.state.lock().await;
        if let Some(stamp) = document
            .get(SERVER_TIMESTAMP_FIELD)
            .and_then(crate::models::flexible::value_to_millis)
        {
            state.last_stamp = state.last_stamp.max(stamp);
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
    }

    pub async fn document(&self, collection: &str, id: &str) -> Option<Document> {
        let state = self.state.lock().await;
        state.collections.get(collection)?.get(id).cloned()
    }

    pub async fn len(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Every query issued so far.
    pub async fn queries(&self) -> Vec<QueryRecord> {
        self.state.lock().await.queries.clone()
    }

    pub async fn clear_queries(&self) {
        self.state.lock().await.queries.clear();
    }

    /// Number of accepted upserts.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::Remote("remote store unavailable".to_string()));
        }
        Ok(())
    }

    fn check_collection(state: &State, collection: &str) -> Result<()> {
        if state.unavailable.contains(collection) {
            return Err(Error::Remote(format!("collection {collection} unavailable")));
        }
        Ok(())
    }

    fn select(
        state: &State,
        collection: &str,
        filter: Option<&FieldFilter>,
        since: Option<i64>,
    ) -> Vec<RemoteDocument> {
        let Some(documents) = state.collections.get(collection) else {
            return Vec::new();
        };
        documents
            .iter()
            .filter(|(id, data)| filter.is_none_or(|filter| filter.matches(id, data)))
            .map(|(id, data)| RemoteDocument::new(id.clone(), data.clone()))
            .filter(|document| {
                since.is_none_or(|since| document.modified_at().is_some_and(|at| at > since))
            })
            .collect()
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_all(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<RemoteDocument>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.queries.push(QueryRecord::All {
            collection: collection.to_string(),
            filter: filter.cloned(),
        });
        Self::check_collection(&state, collection)?;
        Ok(Self::select(&state, collection, filter, None))
    }

    async fn get_modified_since(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
        since: i64,
    ) -> Result<Vec<RemoteDocument>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.queries.push(QueryRecord::ModifiedSince {
            collection: collection.to_string(),
            filter: filter.cloned(),
            since,
        });
        Self::check_collection(&state, collection)?;
        if self.fail_incremental.load(Ordering::SeqCst) {
            return Err(Error::Remote(format!(
                "query on {collection} requires an index on {SERVER_TIMESTAMP_FIELD}"
            )));
        }
        Ok(Self::select(&state, collection, filter, Some(since)))
    }

    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<RemoteDocument>> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.queries.push(QueryRecord::Where {
            collection: collection.to_string(),
            field: field.to_string(),
        });
        Self::check_collection(&state, collection)?;
        let filter = FieldFilter::equals(field, value.clone());
        Ok(Self::select(&state, collection, Some(&filter), None))
    }

    async fn upsert(&self, collection: &str, id: &str, mut document: Document) -> Result<i64> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        // server timestamps are strictly increasing even when the clock stalls
        let stamp = self.clock.now_millis().max(state.last_stamp + 1);
        state.last_stamp = stamp;
        state.writes += 1;
        document.insert(SERVER_TIMESTAMP_FIELD.to_string(), Value::from(stamp));
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(stamp)
    }
}
