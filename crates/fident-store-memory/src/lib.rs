//! In-memory [`DocumentStore`] backend.
//!
//! Backs the test suites; also useful for local development without a
//! running document store. Documents live in per-collection vectors in
//! insertion order, so query results are stable run to run. Every
//! operation takes the whole-store lock briefly; this is a test backend,
//! not a throughput play.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use fident_auth::store::{DocumentStore, FieldFilter, FilterOp, StoreError, StoreResult};

/// In-memory document store. Cheap to create, one per test.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<(String, Value)>>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, for test assertions.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Returns `true` if the collection holds no documents.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, body)| body.clone()))
    }

    async fn create(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|(doc_id, _)| doc_id == id) {
            return Err(StoreError::conflict(collection, id));
        }
        docs.push((id.to_string(), body.clone()));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::missing(collection, id))?;
        let slot = docs
            .iter_mut()
            .find(|(doc_id, _)| doc_id == id)
            .ok_or_else(|| StoreError::missing(collection, id))?;
        slot.1 = body.clone();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.retain(|(doc_id, _)| doc_id != id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let matches = docs
            .iter()
            .filter(|(_, body)| filters.iter().all(|filter| matches_filter(body, filter)))
            .map(|(_, body)| body.clone());
        Ok(match limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }
}

fn matches_filter(body: &Value, filter: &FieldFilter) -> bool {
    let field = resolve_path(body, &filter.path);
    match filter.op {
        FilterOp::Eq => field == Some(&filter.value),
        FilterOp::Lt => match (field.and_then(Value::as_f64), filter.value.as_f64()) {
            (Some(field), Some(bound)) => field < bound,
            // Absent or non-numeric fields never match an ordering filter.
            _ => false,
        },
        FilterOp::In => match (&filter.value, field) {
            (Value::Array(candidates), Some(field)) => candidates.contains(field),
            _ => false,
        },
    }
}

fn resolve_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = body;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}
