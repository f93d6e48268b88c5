//! The process-wide signing key ring.
//!
//! A ring holds exactly one primary pair and at most one secondary pair.
//! Every new signature comes from the primary; verification resolves the
//! token header's `kid` against either pair. Rotation happens out of
//! process: a new generation starts with a fresh primary and the old
//! primary demoted to secondary, so tokens signed before the rotation keep
//! verifying until they expire on their own.
//!
//! The ring is immutable after construction and safe to share across
//! request tasks.

use jsonwebtoken::{DecodingKey, EncodingKey, Validation};
use rsa::BigUint;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AuthError;
use crate::keys::SigningAlgorithm;
use crate::keys::jwk::{Jwk, JwkSet, b64_decode};

/// A loaded signing key pair: private material for signing, public for
/// verification and publication.
pub struct SigningKeyPair {
    kid: String,
    algorithm: SigningAlgorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    public: Jwk,
}

impl SigningKeyPair {
    /// Builds a pair from its private and public JWKs.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if either JWK fails validation,
    /// the two halves disagree on `kid` or `alg`, the private JWK carries
    /// no private material, or the key parameters cannot be rebuilt into
    /// usable keys.
    pub fn from_jwks(private: &Jwk, public: &Jwk) -> Result<Self, AuthError> {
        private.validate()?;
        public.validate()?;
        if private.kid != public.kid {
            return Err(AuthError::invalid_key("private/public kid mismatch"));
        }
        if private.alg != public.alg {
            return Err(AuthError::invalid_key("private/public alg mismatch"));
        }
        if !private.is_private() {
            return Err(AuthError::invalid_key(
                "private JWK carries no private material",
            ));
        }
        let algorithm = private.algorithm()?;
        let (encoding, decoding) = if algorithm.is_rsa() {
            (rsa_encoding_key(private)?, rsa_decoding_key(public)?)
        } else {
            (ec_encoding_key(private)?, ec_decoding_key(public)?)
        };
        let kid = private
            .kid
            .clone()
            .ok_or_else(|| AuthError::invalid_key("missing JWK field: kid"))?;
        Ok(Self {
            kid,
            algorithm,
            encoding,
            decoding,
            public: public.public(),
        })
    }

    /// Returns the key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }
}

/// Primary plus optional secondary signing key pair.
pub struct KeyRing {
    primary: SigningKeyPair,
    secondary: Option<SigningKeyPair>,
}

impl KeyRing {
    /// Creates a ring from already-loaded pairs.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the secondary shares the
    /// primary's kid; kids must stay unique or `verify` could not resolve
    /// them.
    pub fn new(
        primary: SigningKeyPair,
        secondary: Option<SigningKeyPair>,
    ) -> Result<Self, AuthError> {
        if let Some(secondary) = &secondary
            && secondary.kid == primary.kid
        {
            return Err(AuthError::invalid_key(format!(
                "secondary key reuses primary kid: {}",
                primary.kid
            )));
        }
        Ok(Self { primary, secondary })
    }

    /// Returns the kid every new signature will carry.
    #[must_use]
    pub fn primary_kid(&self) -> &str {
        self.primary.kid()
    }

    /// Returns the retiring key's kid, if a secondary is loaded.
    #[must_use]
    pub fn secondary_kid(&self) -> Option<&str> {
        self.secondary.as_ref().map(SigningKeyPair::kid)
    }

    /// Signs a claims object with the primary key. The issued token carries
    /// the primary's `kid` in its header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the claims cannot be
    /// serialized or signing fails.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let mut header = jsonwebtoken::Header::new(self.primary.algorithm.jwt_algorithm());
        header.kid = Some(self.primary.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.primary.encoding)
            .map_err(|e| AuthError::invalid_token(format!("signing failed: {e}")))
    }

    /// Verifies a token's signature and expiry, resolving the verification
    /// key by the header's `kid`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownKey`] if the `kid` matches neither pair (or
    ///   the header carries none)
    /// - [`AuthError::TokenExpired`] if `exp` is in the past
    /// - [`AuthError::BadSignature`] if the signature does not validate
    /// - [`AuthError::InvalidToken`] for any other malformation
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::invalid_token(format!("unreadable token header: {e}")))?;
        let kid = header.kid.unwrap_or_default();
        let pair = self
            .resolve(&kid)
            .ok_or_else(|| AuthError::unknown_key(kid))?;

        let mut validation = Validation::new(pair.algorithm.jwt_algorithm());
        validation.validate_aud = false;

        match jsonwebtoken::decode::<T>(token, &pair.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => Err(match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::BadSignature,
                _ => AuthError::invalid_token(err.to_string()),
            }),
        }
    }

    /// Returns the published verification key set: primary first, then
    /// secondary if present. Both stay exposed for the whole rotation
    /// overlap window.
    #[must_use]
    pub fn public_key_set(&self) -> JwkSet {
        let mut keys = vec![self.primary.public.clone()];
        if let Some(secondary) = &self.secondary {
            keys.push(secondary.public.clone());
        }
        JwkSet { keys }
    }

    fn resolve(&self, kid: &str) -> Option<&SigningKeyPair> {
        if self.primary.kid == kid {
            return Some(&self.primary);
        }
        self.secondary.as_ref().filter(|pair| pair.kid == kid)
    }
}

fn rsa_encoding_key(private: &Jwk) -> Result<EncodingKey, AuthError> {
    let n = rsa_component(private.n.as_deref(), "n")?;
    let e = rsa_component(private.e.as_deref(), "e")?;
    let d = rsa_component(private.d.as_deref(), "d")?;
    let p = rsa_component(private.p.as_deref(), "p")?;
    let q = rsa_component(private.q.as_deref(), "q")?;
    let key = rsa::RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| AuthError::invalid_key(format!("unusable RSA private key: {e}")))?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AuthError::invalid_key(format!("RSA key encoding failed: {e}")))?;
    EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| AuthError::invalid_key(format!("unusable RSA PEM: {e}")))
}

fn rsa_decoding_key(public: &Jwk) -> Result<DecodingKey, AuthError> {
    let n = public
        .n
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key("missing JWK field: n"))?;
    let e = public
        .e
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key("missing JWK field: e"))?;
    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| AuthError::invalid_key(format!("unusable RSA public key: {err}")))
}

fn ec_encoding_key(private: &Jwk) -> Result<EncodingKey, AuthError> {
    let d = private
        .d
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key("missing JWK field: d"))?;
    let scalar = b64_decode(d, "d")?;
    let key = p384::SecretKey::from_slice(&scalar)
        .map_err(|e| AuthError::invalid_key(format!("unusable EC private key: {e}")))?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AuthError::invalid_key(format!("EC key encoding failed: {e}")))?;
    EncodingKey::from_ec_pem(pem.as_bytes())
        .map_err(|e| AuthError::invalid_key(format!("unusable EC PEM: {e}")))
}

fn ec_decoding_key(public: &Jwk) -> Result<DecodingKey, AuthError> {
    let x = public
        .x
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key("missing JWK field: x"))?;
    let y = public
        .y
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key("missing JWK field: y"))?;
    DecodingKey::from_ec_components(x, y)
        .map_err(|err| AuthError::invalid_key(format!("unusable EC public key: {err}")))
}

fn rsa_component(value: Option<&str>, field: &str) -> Result<BigUint, AuthError> {
    let value = value.ok_or_else(|| AuthError::invalid_key(format!("missing JWK field: {field}")))?;
    Ok(BigUint::from_bytes_be(&b64_decode(value, field)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::jwk::{generate_p384, generate_rsa};
    use serde::Deserialize;
    use time::OffsetDateTime;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestClaims {
        sub: String,
        iat: i64,
        exp: i64,
    }

    fn claims(exp_offset: i64) -> TestClaims {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        TestClaims {
            sub: "user-1".to_string(),
            iat: now,
            exp: now + exp_offset,
        }
    }

    fn rsa_pair(kid: &str) -> SigningKeyPair {
        let (private, public) = generate_rsa(kid, SigningAlgorithm::RS256).unwrap();
        SigningKeyPair::from_jwks(&private, &public).unwrap()
    }

    #[test]
    fn test_sign_verify_round_trip_rsa() {
        let ring = KeyRing::new(rsa_pair("k1"), None).unwrap();
        let token = ring.sign(&claims(600)).unwrap();
        let verified: TestClaims = ring.verify(&token).unwrap();
        assert_eq!(verified.sub, "user-1");

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
    }

    #[test]
    fn test_sign_verify_round_trip_ec() {
        let (private, public) = generate_p384("ec-1").unwrap();
        let pair = SigningKeyPair::from_jwks(&private, &public).unwrap();
        let ring = KeyRing::new(pair, None).unwrap();
        let token = ring.sign(&claims(600)).unwrap();
        let verified: TestClaims = ring.verify(&token).unwrap();
        assert_eq!(verified.sub, "user-1");
    }

    #[test]
    fn test_unknown_kid_rejected() {
        let signer = KeyRing::new(rsa_pair("old"), None).unwrap();
        let verifier = KeyRing::new(rsa_pair("new"), None).unwrap();
        let token = signer.sign(&claims(600)).unwrap();
        match verifier.verify::<TestClaims>(&token) {
            Err(AuthError::UnknownKey { kid }) => assert_eq!(kid, "old"),
            other => panic!("expected UnknownKey, got {other:?}"),
        }
    }

    #[test]
    fn test_rotation_keeps_old_tokens_verifiable() {
        let (old_private, old_public) = generate_rsa("gen-1", SigningAlgorithm::RS256).unwrap();
        let old_pair = SigningKeyPair::from_jwks(&old_private, &old_public).unwrap();
        let old_ring = KeyRing::new(old_pair, None).unwrap();
        let token = old_ring.sign(&claims(600)).unwrap();

        // New process generation: fresh primary, old primary demoted.
        let demoted = SigningKeyPair::from_jwks(&old_private, &old_public).unwrap();
        let new_ring = KeyRing::new(rsa_pair("gen-2"), Some(demoted)).unwrap();
        let verified: TestClaims = new_ring.verify(&token).unwrap();
        assert_eq!(verified.sub, "user-1");

        let fresh = new_ring.sign(&claims(600)).unwrap();
        let header = jsonwebtoken::decode_header(&fresh).unwrap();
        assert_eq!(header.kid.as_deref(), Some("gen-2"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let ring = KeyRing::new(rsa_pair("k1"), None).unwrap();
        // Past the default leeway.
        let token = ring.sign(&claims(-600)).unwrap();
        match ring.verify::<TestClaims>(&token) {
            Err(AuthError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let ring = KeyRing::new(rsa_pair("k1"), None).unwrap();
        let token = ring.sign(&claims(600)).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = crate::keys::jwk::b64(br#"{"sub":"admin","iat":0,"exp":9999999999}"#);
        parts[1] = &forged;
        let tampered = parts.join(".");
        assert!(matches!(
            ring.verify::<TestClaims>(&tampered),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_public_key_set_order() {
        let ring = KeyRing::new(rsa_pair("primary"), Some(rsa_pair("secondary"))).unwrap();
        let set = ring.public_key_set();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[0].kid.as_deref(), Some("primary"));
        assert_eq!(set.keys[1].kid.as_deref(), Some("secondary"));
        assert!(set.keys.iter().all(|k| !k.is_private()));
    }

    #[test]
    fn test_duplicate_kid_rejected() {
        match KeyRing::new(rsa_pair("same"), Some(rsa_pair("same"))) {
            Err(err) => assert!(err.to_string().contains("same")),
            Ok(_) => panic!("duplicate kid must be rejected"),
        }
    }

    #[test]
    fn test_mismatched_halves_rejected() {
        let (private, _) = generate_rsa("a", SigningAlgorithm::RS256).unwrap();
        let (_, public) = generate_rsa("b", SigningAlgorithm::RS256).unwrap();
        assert!(SigningKeyPair::from_jwks(&private, &public).is_err());
    }
}
