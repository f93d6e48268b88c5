//! PKCE verifier and challenge material (RFC 7636, S256 only).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generates a random code verifier: 32 octets of entropy, base64url
/// encoded to 43 characters, inside the RFC 7636 43-128 length window.
#[must_use]
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a random CSRF state token, same entropy budget as the
/// verifier.
#[must_use]
pub fn generate_state() -> String {
    generate_verifier()
}

/// Derives the S256 code challenge: base64url(SHA-256(verifier)).
#[must_use]
pub fn challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B.
    #[test]
    fn test_rfc7636_test_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_s256(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verifier_length_in_window() {
        let verifier = generate_verifier();
        assert!((43..=128).contains(&verifier.len()));
    }

    #[test]
    fn test_verifiers_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = generate_verifier();
        assert_eq!(challenge_s256(&verifier), challenge_s256(&verifier));
    }
}
