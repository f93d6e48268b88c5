//! Backing document store contract.
//!
//! The subsystem persists everything through a generic, filterable
//! key/value document store. The store's query engine is an external
//! collaborator: this trait only assumes per-key atomicity for single-id
//! operations and simple field filters (including dotted paths into the
//! document body) for scans.
//!
//! Implementations must keep `StoreError` distinguishable from "absent":
//! a failed lookup is `Err(_)`, a clean miss is `Ok(None)`. Collapsing the
//! two happens only at the read-path boundary of the components built on
//! top of this trait, never here.

use async_trait::async_trait;
use serde_json::Value;

/// Type alias for document store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by a backing document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or rejected the operation.
    #[error("Store backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A document with this id already exists in the collection.
    #[error("Document already exists: {collection}/{id}")]
    Conflict {
        /// The collection name.
        collection: String,
        /// The conflicting document id.
        id: String,
    },

    /// The target document does not exist (update paths only; deletes of
    /// absent documents succeed).
    #[error("Document not found: {collection}/{id}")]
    Missing {
        /// The collection name.
        collection: String,
        /// The missing document id.
        id: String,
    },

    /// A document could not be serialized or deserialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Missing` error.
    #[must_use]
    pub fn missing(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Missing {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Comparison operator of a [`FieldFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the value.
    Eq,
    /// Field is numerically less than the value. Documents where the field
    /// is absent or null never match.
    Lt,
    /// Field equals one of the values in the (array) value.
    In,
}

/// A single field predicate applied by [`DocumentStore::query`].
///
/// `path` may be dotted to reach into nested objects, e.g.
/// `payload.grantId`.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    /// Dotted path to the field inside the document body.
    pub path: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Value to compare against (an array for `In`).
    pub value: Value,
}

impl FieldFilter {
    /// Creates an equality filter.
    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Creates a less-than filter.
    #[must_use]
    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }

    /// Creates a set-membership filter.
    #[must_use]
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            op: FilterOp::In,
            value: Value::Array(values),
        }
    }
}

/// Generic filterable document store.
///
/// Backends must be safe for concurrent use and atomic per `(collection,
/// id)`: a reader never observes a partially written document. No
/// cross-document transaction or compare-and-swap primitive is assumed.
///
/// # Implementations
///
/// - `fident-store-rest` - REST client for a Directus-style items API
/// - `fident-store-memory` - in-memory backend for tests
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a document with this id already
    /// exists, or a backend error.
    async fn create(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()>;

    /// Replaces an existing document in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] if the document does not exist, or a
    /// backend error.
    async fn update(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()>;

    /// Deletes a document. Deleting an absent document is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Returns documents matching every filter, up to `limit`.
    ///
    /// Result order is backend-defined but stable for a given backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_constructors() {
        let f = FieldFilter::eq("kind", "DeviceCode");
        assert_eq!(f.op, FilterOp::Eq);
        assert_eq!(f.value, json!("DeviceCode"));

        let f = FieldFilter::lt("expires_at", 1700000000_i64);
        assert_eq!(f.op, FilterOp::Lt);

        let f = FieldFilter::is_in("role_id", vec![json!("r1"), json!("r2")]);
        assert_eq!(f.op, FilterOp::In);
        assert_eq!(f.value, json!(["r1", "r2"]));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::conflict("users", "u1");
        assert_eq!(err.to_string(), "Document already exists: users/u1");

        let err = StoreError::backend("connection refused");
        assert_eq!(err.to_string(), "Store backend error: connection refused");
    }
}
