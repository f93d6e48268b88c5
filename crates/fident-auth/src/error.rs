//! Error types for the token and session lifecycle subsystem.
//!
//! This module defines all error types that can occur while persisting
//! protocol artifacts, verifying tokens, or carrying a login interaction.
//!
//! Two rules shape how these errors surface to callers:
//!
//! - Verification failures (`TokenExpired`, `Revoked`, `UnknownKey`,
//!   `BadSignature`, `InvalidToken`) are always reported as a generic
//!   "not authenticated" so a replay attacker cannot distinguish a revoked
//!   token from a forged one.
//! - `InvalidCredentials` and `AccountSuspended` share a single public
//!   message so login responses do not enumerate accounts.

use crate::store::StoreError;

/// Errors that can occur during lifecycle, key, and interaction operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Required startup input is missing or malformed. Fatal; the process
    /// must not start.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The backing store failed on a write path.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The artifact or subject is absent or expired. Never distinguished
    /// from "never existed".
    #[error("Not found")]
    NotFound,

    /// The subject no longer exists. Fatal to the operation that needed it
    /// (claims assembly, revocation write).
    #[error("Subject not found: {id}")]
    SubjectNotFound {
        /// The subject id that could not be resolved.
        id: String,
    },

    /// The token was issued before the subject's revocation watermark.
    #[error("Token revoked")]
    Revoked,

    /// The token's `exp` claim is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// The token header carries a `kid` that matches neither the primary
    /// nor the secondary verification key.
    #[error("Unknown signing key: {kid}")]
    UnknownKey {
        /// The unmatched key id (empty if the header carried none).
        kid: String,
    },

    /// The token signature does not validate against the resolved key.
    #[error("Bad signature")]
    BadSignature,

    /// The token is malformed or its claims are invalid.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// Signing key material is malformed or incomplete.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The callback's `state` does not match the stored CSRF state.
    /// Terminal for the login attempt.
    #[error("CSRF state mismatch")]
    CsrfMismatch,

    /// The stored PKCE code verifier is gone. Terminal for the login attempt.
    #[error("Missing PKCE code verifier")]
    MissingVerifier,

    /// The callback is unusable: the authorization code is missing or the
    /// upstream reported an error. Terminal for the login attempt.
    #[error("Invalid callback: {message}")]
    InvalidCallback {
        /// Description of the callback problem.
        message: String,
    },

    /// The code/verifier exchange at the token endpoint failed. Terminal;
    /// no session is established.
    #[error("Token exchange failed: {message}")]
    ExchangeFailed {
        /// Description of the exchange failure.
        message: String,
    },

    /// The subject is unknown or the password does not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The subject exists but is not active.
    #[error("Account suspended")]
    AccountSuspended,

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `SubjectNotFound` error.
    #[must_use]
    pub fn subject_not_found(id: impl Into<String>) -> Self {
        Self::SubjectNotFound { id: id.into() }
    }

    /// Creates a new `UnknownKey` error.
    #[must_use]
    pub fn unknown_key(kid: impl Into<String>) -> Self {
        Self::UnknownKey { kid: kid.into() }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidCallback` error.
    #[must_use]
    pub fn invalid_callback(message: impl Into<String>) -> Self {
        Self::InvalidCallback {
            message: message.into(),
        }
    }

    /// Creates a new `ExchangeFailed` error.
    #[must_use]
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::ExchangeFailed {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a verification failure that must surface
    /// as a generic "not authenticated".
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::Revoked
                | Self::TokenExpired
                | Self::UnknownKey { .. }
                | Self::BadSignature
                | Self::InvalidToken { .. }
        )
    }

    /// Returns `true` if this error terminates a login interaction attempt.
    #[must_use]
    pub fn is_interaction_error(&self) -> bool {
        matches!(
            self,
            Self::CsrfMismatch
                | Self::MissingVerifier
                | Self::InvalidCallback { .. }
                | Self::ExchangeFailed { .. }
        )
    }

    /// Returns `true` if this is a credential failure during login.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::AccountSuspended)
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::InvalidKey { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns the message safe to show to the end caller.
    ///
    /// Credential failures collapse to one message (no account enumeration),
    /// verification failures collapse to "Not authenticated" (no revocation
    /// oracle), and server errors never leak internals.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::AccountSuspended => "Invalid credentials",
            Self::CsrfMismatch => "Invalid state parameter",
            Self::MissingVerifier => "Missing code verifier",
            Self::InvalidCallback { .. } => "Invalid authorization callback",
            Self::ExchangeFailed { .. } => "Failed to exchange authorization code",
            e if e.is_unauthenticated() => "Not authenticated",
            _ => "Internal error",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::configuration("missing FIDENT_STORE_URL");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing FIDENT_STORE_URL"
        );

        let err = AuthError::unknown_key("kid-1");
        assert_eq!(err.to_string(), "Unknown signing key: kid-1");

        let err = AuthError::Revoked;
        assert_eq!(err.to_string(), "Token revoked");
    }

    #[test]
    fn test_unauthenticated_predicate() {
        assert!(AuthError::Revoked.is_unauthenticated());
        assert!(AuthError::TokenExpired.is_unauthenticated());
        assert!(AuthError::BadSignature.is_unauthenticated());
        assert!(AuthError::unknown_key("x").is_unauthenticated());
        assert!(AuthError::NotFound.is_unauthenticated());
        assert!(!AuthError::InvalidCredentials.is_unauthenticated());
        assert!(!AuthError::storage("down").is_unauthenticated());
    }

    #[test]
    fn test_interaction_predicate() {
        assert!(AuthError::CsrfMismatch.is_interaction_error());
        assert!(AuthError::MissingVerifier.is_interaction_error());
        assert!(AuthError::exchange_failed("500").is_interaction_error());
        assert!(!AuthError::Revoked.is_interaction_error());
    }

    #[test]
    fn test_credential_failures_share_public_message() {
        assert_eq!(
            AuthError::InvalidCredentials.public_message(),
            AuthError::AccountSuspended.public_message()
        );
    }

    #[test]
    fn test_verification_failures_share_public_message() {
        assert_eq!(AuthError::Revoked.public_message(), "Not authenticated");
        assert_eq!(AuthError::BadSignature.public_message(), "Not authenticated");
        assert_eq!(
            AuthError::unknown_key("kid-2").public_message(),
            "Not authenticated"
        );
    }

    #[test]
    fn test_server_errors_do_not_leak() {
        assert_eq!(
            AuthError::storage("connection refused to 10.0.0.5").public_message(),
            "Internal error"
        );
    }
}
