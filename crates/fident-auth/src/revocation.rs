//! Per-subject revocation watermark.
//!
//! There is no token blacklist. Revoking everything a subject holds is a
//! single write: `revoked_before = now` on the subject. Verification then
//! compares every token's issue time against the watermark, so the write
//! takes effect on the very next check. Callers must re-check on every
//! protected request; claims already held in memory are not retroactively
//! invalidated.

use crate::AuthResult;
use crate::directory::{UserDirectory, watermark_now};

/// Watermark check and write, backed by the user directory.
#[derive(Clone)]
pub struct RevocationGuard {
    directory: UserDirectory,
}

impl RevocationGuard {
    /// Creates a guard over the user directory.
    #[must_use]
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }

    /// Returns `true` if a token issued at `token_issued_at` (unix
    /// seconds) is still acceptable for this subject.
    ///
    /// A missing subject fails the check, and so does a directory error:
    /// revocation is a security gate, never fail-open.
    pub async fn is_valid(&self, subject_id: &str, token_issued_at: i64) -> bool {
        let user = match self.directory.find_by_id(subject_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(subject_id, "revocation check: subject missing");
                return false;
            }
            Err(err) => {
                tracing::warn!(subject_id, error = %err, "revocation check failed, rejecting");
                return false;
            }
        };
        match user.revoked_before {
            None => true,
            // The stored watermark may carry fractional seconds; token iat
            // never does, so compare against the floor.
            Some(watermark) => token_issued_at >= watermark.floor() as i64,
        }
    }

    /// Sets the subject's watermark to now, invalidating every token
    /// issued so far.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::SubjectNotFound`] if the subject does
    /// not exist, or a storage error. A revocation the caller asked for
    /// must never be silently dropped.
    pub async fn revoke_all(&self, subject_id: &str) -> AuthResult<()> {
        self.directory
            .set_revoked_before(subject_id, watermark_now())
            .await?;
        tracing::info!(subject_id, "revoked all tokens for subject");
        Ok(())
    }
}
