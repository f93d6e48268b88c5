//! Artifact lifecycle store.
//!
//! [`EntityStore`] implements the storage-adapter contract the external
//! protocol engine persists through: upsert, lookup (by id, device user
//! code, or interaction uid), one-time consumption, destruction, cascading
//! grant revocation, and batched expiry cleanup.
//!
//! Expiry is read-time authoritative and lazily enforced: every lookup
//! checks `expires_at` before returning and issues a best-effort delete of
//! an expired record. Physical deletion of the backlog is the job of
//! [`clean_expired`](EntityStore::clean_expired), driven periodically by
//! the sweeper in [`crate::store::cleanup`].
//!
//! # Failure semantics
//!
//! Read paths fail safe: a backend error during a lookup is logged and
//! collapsed to absent, pushing the caller toward re-authentication rather
//! than accepting an unverified artifact. Write paths (`upsert`, `consume`,
//! `revoke_by_grant_id`) propagate errors - the engine must learn that an
//! artifact it just told a client about was not persisted.

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::store::artifact::{ArtifactPayload, ArtifactRecord};
use crate::store::document::{DocumentStore, FieldFilter, StoreResult};

/// Collection holding all protocol artifacts.
pub const ARTIFACT_COLLECTION: &str = "oidc_artifacts";

/// TTL-aware record store for protocol artifacts.
#[derive(Clone)]
pub struct EntityStore {
    store: Arc<dyn DocumentStore>,
}

impl EntityStore {
    /// Creates a new entity store over a backing document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Inserts or fully replaces the artifact with this id.
    ///
    /// `issued_at` is set to now; `expires_at` to now + `ttl_secs` when a
    /// non-zero TTL is given, otherwise the record does not expire. Kind
    /// and session reference are derived from the payload. A replace
    /// clears any previous `consumed_at`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures: the engine must not hand out an
    /// artifact that was never persisted.
    pub async fn upsert(
        &self,
        id: &str,
        payload: &ArtifactPayload,
        ttl_secs: Option<u64>,
    ) -> AuthResult<()> {
        let now = unix_now();
        let record = ArtifactRecord {
            id: id.to_string(),
            kind: payload.kind(),
            session_ref: payload.session_ref().map(str::to_string),
            payload: payload.clone(),
            issued_at: now,
            expires_at: ttl_secs.filter(|ttl| *ttl > 0).map(|ttl| now + ttl as i64),
            consumed_at: None,
        };
        let body = serde_json::to_value(&record).map_err(crate::store::StoreError::from)?;

        // Read-modify-write: the backend is atomic per id, so concurrent
        // readers see either the old record or the new one, never a blend.
        if self.store.get(ARTIFACT_COLLECTION, id).await?.is_some() {
            self.store.update(ARTIFACT_COLLECTION, id, &body).await?;
            tracing::debug!(kind = %record.kind, id, "replaced artifact");
        } else {
            self.store.create(ARTIFACT_COLLECTION, id, &body).await?;
            tracing::debug!(kind = %record.kind, id, "stored artifact");
        }
        Ok(())
    }

    /// Finds an artifact by id, or absent.
    ///
    /// Backend errors are collapsed to absent (fail safe); use
    /// [`try_find`](Self::try_find) where the distinction matters.
    pub async fn find(&self, id: &str) -> Option<ArtifactRecord> {
        match self.try_find(id).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(id, error = %err, "artifact lookup failed, treating as absent");
                None
            }
        }
    }

    /// Finds an artifact by id, keeping backend errors distinguishable
    /// from absence.
    ///
    /// An expired record is destroyed (best effort) and reported absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    pub async fn try_find(&self, id: &str) -> StoreResult<Option<ArtifactRecord>> {
        let Some(body) = self.store.get(ARTIFACT_COLLECTION, id).await? else {
            return Ok(None);
        };
        let record: ArtifactRecord = serde_json::from_value(body)?;
        Ok(self.reap_if_expired(record).await)
    }

    /// Finds a device code by its user-facing pairing code.
    ///
    /// Backend errors are collapsed to absent (fail safe). Expired matches
    /// behave as absent, same as [`find`](Self::find).
    pub async fn find_by_user_code(&self, user_code: &str) -> Option<ArtifactRecord> {
        let filters = [
            FieldFilter::eq("kind", "DeviceCode"),
            FieldFilter::eq("payload.userCode", user_code),
        ];
        self.find_one(&filters, "user code lookup").await
    }

    /// Finds an interaction by its uid.
    ///
    /// Backend errors are collapsed to absent (fail safe). Expired matches
    /// behave as absent.
    pub async fn find_by_uid(&self, uid: &str) -> Option<ArtifactRecord> {
        let filters = [
            FieldFilter::eq("kind", "Interaction"),
            FieldFilter::eq("session_ref", uid),
        ];
        self.find_one(&filters, "interaction lookup").await
    }

    /// Marks an artifact as consumed.
    ///
    /// Idempotent: the first call sets `consumed_at`, later calls leave it
    /// unchanged. Consuming an absent artifact is a no-op, not an error.
    /// The record stays retrievable - callers reject replay by inspecting
    /// `consumed_at`, this method never deletes.
    ///
    /// # Errors
    ///
    /// Propagates backend failures on the write.
    pub async fn consume(&self, id: &str) -> AuthResult<()> {
        let Some(body) = self.store.get(ARTIFACT_COLLECTION, id).await? else {
            return Ok(());
        };
        let mut record: ArtifactRecord =
            serde_json::from_value(body).map_err(crate::store::StoreError::from)?;
        if record.consumed_at.is_some() {
            return Ok(());
        }
        record.consumed_at = Some(unix_now());
        let body = serde_json::to_value(&record).map_err(crate::store::StoreError::from)?;
        self.store.update(ARTIFACT_COLLECTION, id, &body).await?;
        tracing::debug!(kind = %record.kind, id, "consumed artifact");
        Ok(())
    }

    /// Deletes an artifact unconditionally. Absent-on-delete is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn destroy(&self, id: &str) -> AuthResult<()> {
        self.store.delete(ARTIFACT_COLLECTION, id).await?;
        tracing::debug!(id, "destroyed artifact");
        Ok(())
    }

    /// Deletes every artifact whose payload references this grant.
    ///
    /// This is a scan-then-delete with no isolation from concurrent
    /// writers: the guarantee is that all records present at scan start are
    /// removed, not that no record referencing the grant exists when the
    /// call returns.
    ///
    /// # Errors
    ///
    /// Propagates backend failures - a revocation the caller asked for
    /// must not be silently dropped.
    pub async fn revoke_by_grant_id(&self, grant_id: &str) -> AuthResult<u64> {
        let filters = [FieldFilter::eq("payload.grantId", grant_id)];
        let matches = self
            .store
            .query(ARTIFACT_COLLECTION, &filters, None)
            .await?;

        let mut removed = 0u64;
        for body in &matches {
            if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                self.store.delete(ARTIFACT_COLLECTION, id).await?;
                removed += 1;
            }
        }
        tracing::info!(grant_id, removed, "revoked grant artifacts");
        Ok(removed)
    }

    /// Deletes up to `batch_limit` expired artifacts.
    ///
    /// Returns the number removed so callers can loop until the backlog is
    /// drained. The batch bound keeps a single invocation from turning
    /// into an unbounded latency spike.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn clean_expired(&self, batch_limit: usize) -> AuthResult<u64> {
        let filters = [FieldFilter::lt("expires_at", json!(unix_now()))];
        let matches = self
            .store
            .query(ARTIFACT_COLLECTION, &filters, Some(batch_limit))
            .await?;

        let mut removed = 0u64;
        for body in &matches {
            if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                self.store.delete(ARTIFACT_COLLECTION, id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "cleaned expired artifacts");
        }
        Ok(removed)
    }

    /// Runs a single-result filtered lookup with fail-safe error handling
    /// and lazy expiry.
    async fn find_one(&self, filters: &[FieldFilter], what: &str) -> Option<ArtifactRecord> {
        let matches = match self.store.query(ARTIFACT_COLLECTION, filters, Some(1)).await {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(error = %err, "{what} failed, treating as absent");
                return None;
            }
        };
        let body = matches.into_iter().next()?;
        let record: ArtifactRecord = match serde_json::from_value(body) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "{what} returned malformed record");
                return None;
            }
        };
        self.reap_if_expired(record).await
    }

    /// Returns the record unless expired; expired records are destroyed
    /// best-effort and reported absent.
    async fn reap_if_expired(&self, record: ArtifactRecord) -> Option<ArtifactRecord> {
        if !record.is_expired(unix_now()) {
            return Some(record);
        }
        tracing::debug!(kind = %record.kind, id = %record.id, "artifact expired, reaping");
        if let Err(err) = self.store.delete(ARTIFACT_COLLECTION, &record.id).await {
            tracing::warn!(id = %record.id, error = %err, "failed to reap expired artifact");
        }
        None
    }
}

pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
