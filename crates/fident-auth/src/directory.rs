//! Read access to the external user store.
//!
//! Subjects, roles, and policies are owned by the external user store;
//! this subsystem reads them through the same [`DocumentStore`] contract
//! it persists artifacts through. The only field it ever writes back is a
//! subject's `revoked_before` watermark (see [`crate::revocation`]).
//!
//! Subject-to-role and role-to-policy links are plain junction
//! collections; joins here are two-step filtered queries, never an
//! expansion pushed into the backend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::AuthResult;
use crate::store::document::{DocumentStore, FieldFilter};
use crate::store::entity::unix_now;

/// Collection names in the external user store.
pub const USERS_COLLECTION: &str = "users";
pub const USER_ROLES_COLLECTION: &str = "user_roles";
pub const ROLES_COLLECTION: &str = "roles";
pub const ROLE_POLICIES_COLLECTION: &str = "role_policies";
pub const POLICIES_COLLECTION: &str = "policies";

/// Account status of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// The account may authenticate.
    Active,
    /// The account exists but may not authenticate.
    Suspended,
    /// Any other status the user store knows; treated as not active.
    #[serde(other)]
    Unknown,
}

/// A subject as read from the external user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Subject id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Opaque password hash; verified through [`crate::password`].
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Account status.
    pub status: UserStatus,
    /// Revocation watermark: tokens issued before this instant are
    /// invalid. Fractional seconds allowed; checks floor it.
    #[serde(default)]
    pub revoked_before: Option<f64>,
}

impl User {
    /// Returns `true` if the account may authenticate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A named role a subject holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Role id.
    pub id: String,
    /// Role name, the value embedded in token claims.
    pub name: String,
}

/// Whether a policy grants or withholds access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// The policy grants the listed actions.
    Allow,
    /// The policy withholds the listed actions.
    Deny,
}

/// An authorization policy attached to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Policy id; deduplication key across roles.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// Grant or deny.
    pub effect: PolicyEffect,
    /// Resource patterns the policy covers.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Action names the policy covers.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Backend-specific condition document; opaque here, evaluated by the
    /// policy engine downstream, never embedded in token claims.
    #[serde(default)]
    pub conditions: Option<Value>,
}

/// Reader (plus watermark writer) for the external user store.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    /// Creates a directory over a backing document store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Loads a subject by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend lookup fails; absence is
    /// `Ok(None)`.
    pub async fn find_by_id(&self, id: &str) -> AuthResult<Option<User>> {
        let Some(body) = self.store.get(USERS_COLLECTION, id).await? else {
            return Ok(None);
        };
        let user = serde_json::from_value(body).map_err(crate::store::StoreError::from)?;
        Ok(Some(user))
    }

    /// Loads a subject by login email.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend lookup fails.
    pub async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let filters = [FieldFilter::eq("email", email)];
        let matches = self.store.query(USERS_COLLECTION, &filters, Some(1)).await?;
        let Some(body) = matches.into_iter().next() else {
            return Ok(None);
        };
        let user = serde_json::from_value(body).map_err(crate::store::StoreError::from)?;
        Ok(Some(user))
    }

    /// Sets the subject's revocation watermark.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::SubjectNotFound`] if the subject does
    /// not exist, or a storage error.
    pub async fn set_revoked_before(&self, id: &str, watermark: f64) -> AuthResult<()> {
        let Some(mut body) = self.store.get(USERS_COLLECTION, id).await? else {
            return Err(crate::AuthError::subject_not_found(id));
        };
        if let Some(obj) = body.as_object_mut() {
            obj.insert("revoked_before".to_string(), json!(watermark));
        }
        self.store.update(USERS_COLLECTION, id, &body).await?;
        Ok(())
    }

    /// Loads the subject's roles, in junction order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any backend lookup fails.
    pub async fn roles_for(&self, user_id: &str) -> AuthResult<Vec<Role>> {
        let filters = [FieldFilter::eq("user_id", user_id)];
        let links = self
            .store
            .query(USER_ROLES_COLLECTION, &filters, None)
            .await?;
        let role_ids = link_ids(&links, "role_id");
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filters = [FieldFilter::is_in("id", role_ids.iter().map(|id| json!(id)).collect())];
        let docs = self.store.query(ROLES_COLLECTION, &filters, None).await?;
        let mut by_id: HashMap<String, Role> = HashMap::with_capacity(docs.len());
        for doc in docs {
            let role: Role = serde_json::from_value(doc).map_err(crate::store::StoreError::from)?;
            by_id.insert(role.id.clone(), role);
        }
        Ok(role_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    /// Loads the policies attached to these roles, in junction order.
    /// Duplicates across roles are preserved; deduplication is the
    /// claims assembler's job.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any backend lookup fails.
    pub async fn policies_for(&self, role_ids: &[String]) -> AuthResult<Vec<Policy>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filters = [FieldFilter::is_in(
            "role_id",
            role_ids.iter().map(|id| json!(id)).collect(),
        )];
        let links = self
            .store
            .query(ROLE_POLICIES_COLLECTION, &filters, None)
            .await?;
        let policy_ids = link_ids(&links, "policy_id");
        if policy_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filters = [FieldFilter::is_in(
            "id",
            policy_ids.iter().map(|id| json!(id)).collect(),
        )];
        let docs = self.store.query(POLICIES_COLLECTION, &filters, None).await?;
        let mut by_id: HashMap<String, Policy> = HashMap::with_capacity(docs.len());
        for doc in docs {
            let policy: Policy =
                serde_json::from_value(doc).map_err(crate::store::StoreError::from)?;
            by_id.insert(policy.id.clone(), policy);
        }
        Ok(policy_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect())
    }
}

/// Current time as a fractional-capable watermark value.
pub(crate) fn watermark_now() -> f64 {
    unix_now() as f64
}

fn link_ids(links: &[Value], field: &str) -> Vec<String> {
    links
        .iter()
        .filter_map(|link| link.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
