//! Password verification seam.
//!
//! Hashing policy belongs to the external user store; this subsystem only
//! needs an opaque "does this plaintext match this hash" capability, so
//! that is the whole trait. The default implementation verifies Argon2
//! PHC-format hashes.

use argon2::Argon2;
use argon2::password_hash::PasswordHash;

/// Opaque plaintext-against-hash check.
pub trait PasswordVerifier: Send + Sync {
    /// Returns `true` if the plaintext matches the stored hash. A
    /// malformed hash is a mismatch, never an error: login must not leak
    /// which accounts have unusable hashes.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Argon2 (PHC string format) verifier.
#[derive(Debug, Default, Clone)]
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        use argon2::PasswordVerifier as _;

        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
