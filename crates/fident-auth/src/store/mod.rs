//! Artifact persistence: document store contract, artifact model,
//! lifecycle store, and background cleanup.

pub mod artifact;
pub mod cleanup;
pub mod document;
pub mod entity;

pub use artifact::{ArtifactKind, ArtifactPayload, ArtifactRecord};
pub use cleanup::{CleanupConfig, CleanupHandle, spawn_cleanup};
pub use document::{DocumentStore, FieldFilter, FilterOp, StoreError, StoreResult};
pub use entity::{ARTIFACT_COLLECTION, EntityStore};
