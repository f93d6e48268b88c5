//! JSON Web Key parsing, validation, generation, and public projection.
//!
//! Key material arrives as JWK JSON through configuration. Validation is
//! deliberately strict and fail-fast: a process holding a malformed signing
//! key would mint tokens nobody can verify, so startup is the right place
//! to die.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::keys::SigningAlgorithm;

/// How long remote parties may cache the published key set, in seconds.
///
/// Rotation demotes the old primary to secondary rather than dropping it,
/// so a stale cached set stays usable for the whole overlap window.
pub const JWKS_CACHE_MAX_AGE_SECS: u64 = 3600;

/// A single JSON Web Key, private or public.
///
/// All fields are optional at the serde level; [`validate`](Self::validate)
/// enforces what a usable key actually requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, `RSA` or `EC`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    /// Key id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Algorithm the key is used with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key use, `sig` for everything this subsystem publishes.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    // RSA public
    /// RSA modulus, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // RSA private
    /// RSA private exponent, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// RSA first prime factor, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    /// RSA second prime factor, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    // EC
    /// EC curve name, `P-384` for ES384.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate, base64url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Parses and validates a JWK from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the JSON is malformed or the
    /// key fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let jwk: Self = serde_json::from_str(json)
            .map_err(|e| AuthError::invalid_key(format!("malformed JWK JSON: {e}")))?;
        jwk.validate()?;
        Ok(jwk)
    }

    /// Checks the fields every usable key needs: `kty`, `kid`, `alg`, plus
    /// `n`/`e` for RSA keys and `crv`/`x`/`y` for EC keys.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] naming the first missing or
    /// unsupported field.
    pub fn validate(&self) -> Result<(), AuthError> {
        let kty = self.require(self.kty.as_deref(), "kty")?;
        self.require(self.kid.as_deref(), "kid")?;
        self.require(self.alg.as_deref(), "alg")?;
        match kty {
            "RSA" => {
                self.require(self.n.as_deref(), "n")?;
                self.require(self.e.as_deref(), "e")?;
            }
            "EC" => {
                self.require(self.crv.as_deref(), "crv")?;
                self.require(self.x.as_deref(), "x")?;
                self.require(self.y.as_deref(), "y")?;
            }
            other => {
                return Err(AuthError::invalid_key(format!(
                    "unsupported key type: {other}"
                )));
            }
        }
        Ok(())
    }

    /// Returns `true` if the key carries private material.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Returns the public projection of this key: identification fields
    /// plus the public parameters, `use` forced to `sig`. Private material
    /// never survives this call.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            kty: self.kty.clone(),
            kid: self.kid.clone(),
            alg: self.alg.clone(),
            use_: Some("sig".to_string()),
            n: self.n.clone(),
            e: self.e.clone(),
            d: None,
            p: None,
            q: None,
            crv: self.crv.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }

    /// Parses the `alg` field.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if `alg` is missing or names an
    /// unsupported algorithm.
    pub fn algorithm(&self) -> Result<SigningAlgorithm, AuthError> {
        self.require(self.alg.as_deref(), "alg")?.parse()
    }

    fn require<'a>(&self, field: Option<&'a str>, name: &str) -> Result<&'a str, AuthError> {
        field
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::invalid_key(format!("missing JWK field: {name}")))
    }
}

/// A JSON Web Key Set document, the shape served at the JWKS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    /// The verification keys, signing-order first.
    pub keys: Vec<Jwk>,
}

/// Generates a fresh RSA signing key pair as (private, public) JWKs.
///
/// # Errors
///
/// Returns [`AuthError::InvalidKey`] if the algorithm is not an RSA
/// algorithm, or [`AuthError::Internal`] if key generation fails.
pub fn generate_rsa(kid: &str, algorithm: SigningAlgorithm) -> Result<(Jwk, Jwk), AuthError> {
    if !algorithm.is_rsa() {
        return Err(AuthError::invalid_key(format!(
            "{algorithm} is not an RSA algorithm"
        )));
    }
    let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
        .map_err(|e| AuthError::internal(format!("RSA key generation failed: {e}")))?;
    let primes = key.primes();
    let private = Jwk {
        kty: Some("RSA".to_string()),
        kid: Some(kid.to_string()),
        alg: Some(algorithm.as_str().to_string()),
        use_: Some("sig".to_string()),
        n: Some(b64(&key.n().to_bytes_be())),
        e: Some(b64(&key.e().to_bytes_be())),
        d: Some(b64(&key.d().to_bytes_be())),
        p: Some(b64(&primes[0].to_bytes_be())),
        q: Some(b64(&primes[1].to_bytes_be())),
        crv: None,
        x: None,
        y: None,
    };
    let public = private.public();
    Ok((private, public))
}

/// Generates a fresh P-384 signing key pair as (private, public) JWKs for
/// ES384.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if key generation fails.
pub fn generate_p384(kid: &str) -> Result<(Jwk, Jwk), AuthError> {
    use elliptic_curve::sec1::ToEncodedPoint;

    let secret = p384::SecretKey::random(&mut rand::rngs::OsRng);
    let point = secret.public_key().to_encoded_point(false);
    let x = point
        .x()
        .ok_or_else(|| AuthError::internal("EC public point missing x coordinate"))?;
    let y = point
        .y()
        .ok_or_else(|| AuthError::internal("EC public point missing y coordinate"))?;
    let private = Jwk {
        kty: Some("EC".to_string()),
        kid: Some(kid.to_string()),
        alg: Some(SigningAlgorithm::ES384.as_str().to_string()),
        use_: Some("sig".to_string()),
        n: None,
        e: None,
        d: Some(b64(secret.to_bytes().as_slice())),
        p: None,
        q: None,
        crv: Some("P-384".to_string()),
        x: Some(b64(x.as_slice())),
        y: Some(b64(y.as_slice())),
    };
    let public = private.public();
    Ok((private, public))
}

pub(crate) fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64_decode(value: &str, field: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| AuthError::invalid_key(format!("invalid base64url in {field}: {e}")))
}
