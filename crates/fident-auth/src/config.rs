//! Process configuration.
//!
//! Everything arrives through the environment. Missing required values
//! and malformed key JSON are fatal at startup: a process that cannot
//! reach its store or sign tokens has nothing useful to do.

use std::time::Duration;

use crate::error::AuthError;
use crate::keys::jwk::Jwk;
use crate::keys::ring::{KeyRing, SigningKeyPair};

/// Default access token lifetime, seconds.
pub const DEFAULT_ACCESS_TOKEN_TTL: u64 = 3600;
/// Default refresh token lifetime, seconds (30 days).
pub const DEFAULT_REFRESH_TOKEN_TTL: u64 = 2_592_000;
/// Default ID token lifetime, seconds.
pub const DEFAULT_ID_TOKEN_TTL: u64 = 3600;
/// Default session cookie name prefix.
pub const DEFAULT_COOKIE_PREFIX: &str = "fidt_";
/// Default OIDC client id used by the first-party app.
pub const DEFAULT_CLIENT_ID: &str = "app";
/// Default OIDC client secret used by the first-party app.
pub const DEFAULT_CLIENT_SECRET: &str = "app-secret";

/// Per-token-kind lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    /// Access token lifetime, seconds.
    pub access: u64,
    /// Refresh token lifetime, seconds.
    pub refresh: u64,
    /// ID token lifetime, seconds.
    pub id: u64,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_TOKEN_TTL,
            refresh: DEFAULT_REFRESH_TOKEN_TTL,
            id: DEFAULT_ID_TOKEN_TTL,
        }
    }
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the backing document/user store.
    pub store_url: String,
    /// Static bearer credential for the store.
    pub store_token: String,
    /// Public base URL this process is reachable at (issuer, redirect
    /// target).
    pub public_url: String,
    /// Primary signing key, private half.
    pub primary_private: Jwk,
    /// Primary signing key, public half.
    pub primary_public: Jwk,
    /// Retiring signing key, if a rotation overlap is in effect.
    pub secondary_private: Option<Jwk>,
    /// Retiring key's public half.
    pub secondary_public: Option<Jwk>,
    /// OIDC client id for the interaction flow.
    pub client_id: String,
    /// OIDC client secret for the interaction flow.
    pub client_secret: String,
    /// Token lifetimes.
    pub ttls: TokenTtls,
    /// Name prefix for every session cookie.
    pub cookie_prefix: String,
    /// Local-development mode: cookies drop the `Secure` attribute so the
    /// flow works over plain http.
    pub dev_mode: bool,
}

impl AuthConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for missing required values or
    /// unparseable TTLs, and [`AuthError::InvalidKey`] for malformed key
    /// JSON. Both are process-fatal.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary lookup, for tests.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::configuration(format!("missing {name}")))
        };

        let primary_private = Jwk::from_json(&required("FIDENT_JWT_PRIMARY_PRIVATE_KEY")?)?;
        let primary_public = Jwk::from_json(&required("FIDENT_JWT_PRIMARY_PUBLIC_KEY")?)?;

        // The secondary pair is optional but must be whole: a half pair is
        // a rotation mistake, not a configuration style.
        let secondary_private_json = lookup("FIDENT_JWT_SECONDARY_PRIVATE_KEY");
        let secondary_public_json = lookup("FIDENT_JWT_SECONDARY_PUBLIC_KEY");
        let (secondary_private, secondary_public) =
            match (secondary_private_json, secondary_public_json) {
                (Some(private), Some(public)) => (
                    Some(Jwk::from_json(&private)?),
                    Some(Jwk::from_json(&public)?),
                ),
                (None, None) => (None, None),
                _ => {
                    return Err(AuthError::configuration(
                        "secondary key pair is incomplete: both \
                         FIDENT_JWT_SECONDARY_PRIVATE_KEY and \
                         FIDENT_JWT_SECONDARY_PUBLIC_KEY are required together",
                    ));
                }
            };

        let ttl = |name: &str, default: u64| -> Result<u64, AuthError> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => raw
                    .parse()
                    .map_err(|_| AuthError::configuration(format!("invalid {name}: {raw}"))),
            }
        };

        Ok(Self {
            store_url: required("FIDENT_STORE_URL")?,
            store_token: required("FIDENT_STORE_TOKEN")?,
            public_url: lookup("FIDENT_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:8055".to_string()),
            primary_private,
            primary_public,
            secondary_private,
            secondary_public,
            client_id: lookup("FIDENT_OIDC_CLIENT_ID")
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            client_secret: lookup("FIDENT_OIDC_CLIENT_SECRET")
                .unwrap_or_else(|| DEFAULT_CLIENT_SECRET.to_string()),
            ttls: TokenTtls {
                access: ttl("FIDENT_ACCESS_TOKEN_TTL", DEFAULT_ACCESS_TOKEN_TTL)?,
                refresh: ttl("FIDENT_REFRESH_TOKEN_TTL", DEFAULT_REFRESH_TOKEN_TTL)?,
                id: ttl("FIDENT_ID_TOKEN_TTL", DEFAULT_ID_TOKEN_TTL)?,
            },
            cookie_prefix: lookup("FIDENT_COOKIE_PREFIX")
                .unwrap_or_else(|| DEFAULT_COOKIE_PREFIX.to_string()),
            dev_mode: lookup("FIDENT_DEV_MODE")
                .is_some_and(|v| matches!(v.as_str(), "1" | "true")),
        })
    }

    /// Whether cookies carry the `Secure` attribute.
    #[must_use]
    pub fn cookies_secure(&self) -> bool {
        !self.dev_mode
    }

    /// Builds the process key ring from the configured pairs.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if any pair cannot be rebuilt
    /// into usable keys.
    pub fn build_key_ring(&self) -> Result<KeyRing, AuthError> {
        let primary = SigningKeyPair::from_jwks(&self.primary_private, &self.primary_public)?;
        let secondary = match (&self.secondary_private, &self.secondary_public) {
            (Some(private), Some(public)) => Some(SigningKeyPair::from_jwks(private, public)?),
            _ => None,
        };
        KeyRing::new(primary, secondary)
    }

    /// Access token lifetime as a [`Duration`].
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.ttls.access)
    }
}
