//! Protocol artifact records.
//!
//! Every object the external protocol engine persists - authorization
//! codes, tokens, sessions, grants, interactions, device codes - is stored
//! as an [`ArtifactRecord`]. The payload is a tagged union keyed by `kind`,
//! which centralizes the per-kind required fields (`grantId`, `userCode`,
//! `uid`): a payload missing its required field fails deserialization
//! instead of surfacing later as a broken scan.
//!
//! Fields the engine attaches beyond the indexed ones round-trip losslessly
//! through the flattened `extra` map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of a stored protocol artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Short-lived authorization code.
    AuthorizationCode,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// ID token.
    IdToken,
    /// User session.
    Session,
    /// Authorization grant.
    Grant,
    /// Login/consent interaction.
    Interaction,
    /// Device flow code.
    DeviceCode,
    /// Client credentials token.
    ClientCredentials,
}

impl ArtifactKind {
    /// Returns the kind as the string used in stored documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "AuthorizationCode",
            Self::AccessToken => "AccessToken",
            Self::RefreshToken => "RefreshToken",
            Self::IdToken => "IdToken",
            Self::Session => "Session",
            Self::Grant => "Grant",
            Self::Interaction => "Interaction",
            Self::DeviceCode => "DeviceCode",
            Self::ClientCredentials => "ClientCredentials",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a stored artifact, tagged by kind.
///
/// The engine's own payload fields beyond the indexed ones are carried in
/// `extra` and returned unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ArtifactPayload {
    /// An authorization code bound to a grant.
    AuthorizationCode {
        /// The grant this code belongs to.
        #[serde(rename = "grantId")]
        grant_id: String,
        /// Session uid the code was issued under, if any.
        #[serde(rename = "sessionUid", skip_serializing_if = "Option::is_none")]
        session_uid: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// An access token bound to a grant.
    AccessToken {
        /// The grant this token belongs to.
        #[serde(rename = "grantId")]
        grant_id: String,
        /// Session uid the token was issued under, if any.
        #[serde(rename = "sessionUid", skip_serializing_if = "Option::is_none")]
        session_uid: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A refresh token bound to a grant.
    RefreshToken {
        /// The grant this token belongs to.
        #[serde(rename = "grantId")]
        grant_id: String,
        /// Session uid the token was issued under, if any.
        #[serde(rename = "sessionUid", skip_serializing_if = "Option::is_none")]
        session_uid: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// An ID token record.
    IdToken {
        /// The grant this token belongs to, if any.
        #[serde(rename = "grantId", skip_serializing_if = "Option::is_none")]
        grant_id: Option<String>,
        /// Session uid the token was issued under, if any.
        #[serde(rename = "sessionUid", skip_serializing_if = "Option::is_none")]
        session_uid: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A user session.
    Session {
        /// The session's own uid; indexed as the record's session reference.
        uid: String,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// An authorization grant.
    Grant {
        /// Account the grant was given by.
        #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
        /// Client the grant was given to.
        #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A login/consent interaction.
    Interaction {
        /// The interaction uid; indexed as the record's session reference.
        uid: String,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A device flow code.
    DeviceCode {
        /// The user-facing pairing code; matched by `find_by_user_code`.
        #[serde(rename = "userCode")]
        user_code: String,
        /// The grant this code belongs to, once authorized.
        #[serde(rename = "grantId", skip_serializing_if = "Option::is_none")]
        grant_id: Option<String>,
        /// Session uid, if any.
        #[serde(rename = "sessionUid", skip_serializing_if = "Option::is_none")]
        session_uid: Option<String>,
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A client credentials token.
    ClientCredentials {
        /// Engine-owned payload fields.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl ArtifactPayload {
    /// Returns the kind of this payload.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::AuthorizationCode { .. } => ArtifactKind::AuthorizationCode,
            Self::AccessToken { .. } => ArtifactKind::AccessToken,
            Self::RefreshToken { .. } => ArtifactKind::RefreshToken,
            Self::IdToken { .. } => ArtifactKind::IdToken,
            Self::Session { .. } => ArtifactKind::Session,
            Self::Grant { .. } => ArtifactKind::Grant,
            Self::Interaction { .. } => ArtifactKind::Interaction,
            Self::DeviceCode { .. } => ArtifactKind::DeviceCode,
            Self::ClientCredentials { .. } => ArtifactKind::ClientCredentials,
        }
    }

    /// Returns the grant this artifact references, if any.
    #[must_use]
    pub fn grant_id(&self) -> Option<&str> {
        match self {
            Self::AuthorizationCode { grant_id, .. }
            | Self::AccessToken { grant_id, .. }
            | Self::RefreshToken { grant_id, .. } => Some(grant_id),
            Self::IdToken { grant_id, .. } | Self::DeviceCode { grant_id, .. } => {
                grant_id.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the session reference indexed alongside this artifact:
    /// the artifact's own uid for sessions and interactions, the issuing
    /// session's uid for everything else that carries one.
    #[must_use]
    pub fn session_ref(&self) -> Option<&str> {
        match self {
            Self::Session { uid, .. } | Self::Interaction { uid, .. } => Some(uid),
            Self::AuthorizationCode { session_uid, .. }
            | Self::AccessToken { session_uid, .. }
            | Self::RefreshToken { session_uid, .. }
            | Self::IdToken { session_uid, .. }
            | Self::DeviceCode { session_uid, .. } => session_uid.as_deref(),
            Self::Grant { .. } | Self::ClientCredentials { .. } => None,
        }
    }

    /// Returns the device-flow user code, if this is a device code.
    #[must_use]
    pub fn user_code(&self) -> Option<&str> {
        match self {
            Self::DeviceCode { user_code, .. } => Some(user_code),
            _ => None,
        }
    }
}

/// A stored protocol artifact.
///
/// `expires_at` is read-time authoritative: a record past its expiry
/// behaves as absent to every read operation even before the lazy delete
/// has run. `consumed_at` marks use without deleting, so replay of a
/// one-time artifact is detectable rather than silently indistinguishable
/// from "never existed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Caller-assigned id, unique across all kinds.
    pub id: String,
    /// Artifact kind, derived from the payload.
    pub kind: ArtifactKind,
    /// Session reference, derived from the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,
    /// The engine's payload.
    pub payload: ArtifactPayload,
    /// Unix seconds the record was written.
    pub issued_at: i64,
    /// Unix seconds past which the record behaves as absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Unix seconds of first consumption, if consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<i64>,
}

impl ArtifactRecord {
    /// Returns `true` if the record has expired at `now` (unix seconds).
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Returns `true` if the record has been consumed.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_kind_tag_round_trip() {
        let payload = ArtifactPayload::AuthorizationCode {
            grant_id: "g1".to_string(),
            session_uid: Some("s1".to_string()),
            extra: Map::new(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "AuthorizationCode");
        assert_eq!(value["grantId"], "g1");
        assert_eq!(value["sessionUid"], "s1");

        let back: ArtifactPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_missing_required_field_fails_deserialization() {
        // An authorization code without a grant id is invalid.
        let result: Result<ArtifactPayload, _> =
            serde_json::from_value(json!({ "kind": "AuthorizationCode" }));
        assert!(result.is_err());

        // A device code without a user code is invalid.
        let result: Result<ArtifactPayload, _> =
            serde_json::from_value(json!({ "kind": "DeviceCode", "grantId": "g1" }));
        assert!(result.is_err());

        // An interaction without a uid is invalid.
        let result: Result<ArtifactPayload, _> =
            serde_json::from_value(json!({ "kind": "Interaction" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let value = json!({
            "kind": "AccessToken",
            "grantId": "g1",
            "scope": "openid profile",
            "accountId": "u1"
        });

        let payload: ArtifactPayload = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(payload.grant_id(), Some("g1"));

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_session_ref_derivation() {
        let session: ArtifactPayload =
            serde_json::from_value(json!({ "kind": "Session", "uid": "s1" })).unwrap();
        assert_eq!(session.session_ref(), Some("s1"));

        let interaction: ArtifactPayload =
            serde_json::from_value(json!({ "kind": "Interaction", "uid": "i1" })).unwrap();
        assert_eq!(interaction.session_ref(), Some("i1"));

        let token: ArtifactPayload = serde_json::from_value(
            json!({ "kind": "AccessToken", "grantId": "g1", "sessionUid": "s1" }),
        )
        .unwrap();
        assert_eq!(token.session_ref(), Some("s1"));

        let grant: ArtifactPayload =
            serde_json::from_value(json!({ "kind": "Grant", "accountId": "u1" })).unwrap();
        assert_eq!(grant.session_ref(), None);
    }

    #[test]
    fn test_user_code_only_on_device_codes() {
        let device: ArtifactPayload =
            serde_json::from_value(json!({ "kind": "DeviceCode", "userCode": "WDJB-MJHT" }))
                .unwrap();
        assert_eq!(device.user_code(), Some("WDJB-MJHT"));
        assert_eq!(device.kind(), ArtifactKind::DeviceCode);

        let session: ArtifactPayload =
            serde_json::from_value(json!({ "kind": "Session", "uid": "s1" })).unwrap();
        assert_eq!(session.user_code(), None);
    }

    #[test]
    fn test_record_expiry_boundary() {
        let record = ArtifactRecord {
            id: "code-1".to_string(),
            kind: ArtifactKind::AuthorizationCode,
            session_ref: None,
            payload: ArtifactPayload::AuthorizationCode {
                grant_id: "g1".to_string(),
                session_uid: None,
                extra: Map::new(),
            },
            issued_at: 1000,
            expires_at: Some(1600),
            consumed_at: None,
        };

        assert!(!record.is_expired(1599));
        assert!(!record.is_expired(1600));
        assert!(record.is_expired(1601));

        let no_expiry = ArtifactRecord {
            expires_at: None,
            ..record
        };
        assert!(!no_expiry.is_expired(i64::MAX));
    }
}
