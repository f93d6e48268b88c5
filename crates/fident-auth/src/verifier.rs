//! Local token verification.
//!
//! Ties the key ring and the revocation guard together: signature and
//! expiry come from the ring, issuer is checked here, and finally the
//! subject's revocation watermark is consulted. Remote verifiers do the
//! same dance against the published JWKS; this is the in-process version.

use std::sync::Arc;

use crate::AuthResult;
use crate::claims::TokenClaims;
use crate::error::AuthError;
use crate::keys::KeyRing;
use crate::revocation::RevocationGuard;

/// Verifies locally-presented tokens end to end.
#[derive(Clone)]
pub struct TokenVerifier {
    ring: Arc<KeyRing>,
    guard: RevocationGuard,
    issuer: String,
}

impl TokenVerifier {
    /// Creates a verifier for tokens minted by this issuer.
    #[must_use]
    pub fn new(ring: Arc<KeyRing>, guard: RevocationGuard, issuer: impl Into<String>) -> Self {
        Self {
            ring,
            guard,
            issuer: issuer.into(),
        }
    }

    /// Verifies signature, expiry, issuer, and revocation watermark.
    ///
    /// # Errors
    ///
    /// Any of the ring's verification errors ([`AuthError::UnknownKey`],
    /// [`AuthError::TokenExpired`], [`AuthError::BadSignature`],
    /// [`AuthError::InvalidToken`]), or [`AuthError::Revoked`] if the
    /// token predates the subject's watermark. All of these surface to
    /// callers as the same public "Not authenticated".
    pub async fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let claims: TokenClaims = self.ring.verify(token)?;
        if claims.iss != self.issuer {
            return Err(AuthError::invalid_token("issuer mismatch"));
        }
        if !self.guard.is_valid(&claims.sub, claims.iat).await {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }
}
