//! Token claims and authorization-data assembly.
//!
//! When the protocol engine mints a token it attaches the subject's roles
//! and policies under a single custom claim namespace. The assembler does
//! the join (subject to roles to policies) and the shaping; it never
//! evaluates policies.

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::directory::{Policy, PolicyEffect, UserDirectory};
use crate::error::AuthError;
use crate::store::entity::unix_now;

/// Namespace of the custom claim carrying authorization data.
pub const AUTHZ_CLAIM: &str = "https://fident.dev/authz";

/// A policy as embedded in token claims.
///
/// Conditions are deliberately omitted: they are backend condition
/// documents evaluated server-side, not facts about the subject, and
/// embedding them would bloat every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyView {
    /// Policy id.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// Grant or deny.
    pub effect: PolicyEffect,
    /// Resource patterns the policy covers.
    pub resources: Vec<String>,
    /// Action names the policy covers.
    pub actions: Vec<String>,
}

impl From<&Policy> for PolicyView {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id.clone(),
            name: policy.name.clone(),
            effect: policy.effect,
            resources: policy.resources.clone(),
            actions: policy.actions.clone(),
        }
    }
}

/// The authorization payload of the custom claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthzClaims {
    /// Role names, in the order the subject holds them.
    pub roles: Vec<String>,
    /// Policies across all roles, deduplicated by id, first occurrence
    /// wins the position.
    pub policies: Vec<PolicyView>,
}

/// Registered claims plus the authorization namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id.
    pub sub: String,
    /// Issuer URL.
    pub iss: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Authorization data, absent on tokens that carry none (e.g. ID
    /// tokens minted for clients that never call the policy engine).
    #[serde(
        rename = "https://fident.dev/authz",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub authz: Option<AuthzClaims>,
}

impl TokenClaims {
    /// Creates claims for a token issued now with this lifetime.
    #[must_use]
    pub fn new(sub: impl Into<String>, iss: impl Into<String>, ttl_secs: u64) -> Self {
        let now = unix_now();
        Self {
            sub: sub.into(),
            iss: iss.into(),
            iat: now,
            exp: now + ttl_secs as i64,
            authz: None,
        }
    }

    /// Attaches assembled authorization data.
    #[must_use]
    pub fn with_authz(mut self, authz: AuthzClaims) -> Self {
        self.authz = Some(authz);
        self
    }
}

/// Joins a subject to its roles and policies for token embedding.
#[derive(Clone)]
pub struct ClaimsAssembler {
    directory: UserDirectory,
}

impl ClaimsAssembler {
    /// Creates an assembler over the user directory.
    #[must_use]
    pub fn new(directory: UserDirectory) -> Self {
        Self { directory }
    }

    /// Assembles the subject's roles and deduplicated policies.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SubjectNotFound`] if the subject no longer
    /// exists - fatal to the mint, never "no claims" - or a storage error
    /// if a lookup fails.
    pub async fn assemble(&self, subject_id: &str) -> AuthResult<AuthzClaims> {
        if self.directory.find_by_id(subject_id).await?.is_none() {
            return Err(AuthError::subject_not_found(subject_id));
        }

        let roles = self.directory.roles_for(subject_id).await?;
        let role_ids: Vec<String> = roles.iter().map(|r| r.id.clone()).collect();
        let policies = self.directory.policies_for(&role_ids).await?;

        let mut seen = std::collections::HashSet::new();
        let mut views = Vec::new();
        for policy in &policies {
            if seen.insert(policy.id.clone()) {
                views.push(PolicyView::from(policy));
            }
        }

        Ok(AuthzClaims {
            roles: roles.into_iter().map(|r| r.name).collect(),
            policies: views,
        })
    }
}
