//! Token and session lifecycle subsystem for the Fident identity provider.
//!
//! The OIDC protocol state machine itself lives in an external engine;
//! this crate is everything underneath it:
//!
//! - **[`store`]** - TTL-aware persistence for every protocol artifact
//!   (codes, tokens, sessions, grants, interactions, device codes), with
//!   lazy expiry, one-time consumption, cascading grant revocation, and
//!   batched background cleanup
//! - **[`keys`]** - the signing key ring: primary plus optional retiring
//!   secondary, JWK loading and generation, JWKS publication
//! - **[`revocation`]** - the per-subject revocation watermark
//! - **[`claims`]** - roles and deduplicated policies shaped into token
//!   claims
//! - **[`verifier`]** - end-to-end local token verification
//! - **[`interaction`]** - the CSRF/PKCE login round trip and the
//!   credential check behind the login prompt
//!
//! Backing storage is abstracted behind [`store::DocumentStore`];
//! `fident-store-rest` talks to the real document store and
//! `fident-store-memory` backs the tests.

pub mod claims;
pub mod config;
pub mod directory;
pub mod error;
pub mod interaction;
pub mod keys;
pub mod password;
pub mod revocation;
pub mod store;
pub mod verifier;

pub use claims::{AuthzClaims, ClaimsAssembler, PolicyView, TokenClaims};
pub use config::{AuthConfig, TokenTtls};
pub use directory::{Policy, PolicyEffect, Role, User, UserDirectory, UserStatus};
pub use error::AuthError;
pub use interaction::{CallbackParams, InteractionFlow, LoginService};
pub use keys::{Jwk, JwkSet, KeyRing, SigningAlgorithm, SigningKeyPair};
pub use password::{Argon2Verifier, PasswordVerifier};
pub use revocation::RevocationGuard;
pub use store::{ArtifactKind, ArtifactPayload, ArtifactRecord, DocumentStore, EntityStore};
pub use verifier::TokenVerifier;

/// Result alias used throughout the crate.
pub type AuthResult<T> = Result<T, AuthError>;
