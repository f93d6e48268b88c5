//! End-to-end verification scenarios: signing, rotation, the revocation
//! watermark, and claims assembly against the in-memory store.

use std::sync::Arc;

use serde_json::json;

use fident_auth::claims::{ClaimsAssembler, TokenClaims};
use fident_auth::directory::{
    POLICIES_COLLECTION, ROLE_POLICIES_COLLECTION, ROLES_COLLECTION, USER_ROLES_COLLECTION,
    USERS_COLLECTION, UserDirectory,
};
use fident_auth::keys::jwk::generate_rsa;
use fident_auth::keys::ring::SigningKeyPair;
use fident_auth::keys::{KeyRing, SigningAlgorithm};
use fident_auth::revocation::RevocationGuard;
use fident_auth::store::DocumentStore;
use fident_auth::verifier::TokenVerifier;
use fident_auth::AuthError;
use fident_store_memory::MemoryDocumentStore;

const ISSUER: &str = "https://id.example.com";

fn ring(kid: &str) -> KeyRing {
    let (private, public) = generate_rsa(kid, SigningAlgorithm::RS256).unwrap();
    let pair = SigningKeyPair::from_jwks(&private, &public).unwrap();
    KeyRing::new(pair, None).unwrap()
}

async fn store_with_user(revoked_before: Option<f64>) -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    let mut user = json!({
        "id": "u1",
        "email": "u1@example.com",
        "status": "active"
    });
    if let Some(watermark) = revoked_before {
        user["revoked_before"] = json!(watermark);
    }
    store.create(USERS_COLLECTION, "u1", &user).await.unwrap();
    store
}

fn verifier_over(store: Arc<MemoryDocumentStore>, ring: Arc<KeyRing>) -> TokenVerifier {
    let guard = RevocationGuard::new(UserDirectory::new(store));
    TokenVerifier::new(ring, guard, ISSUER)
}

#[tokio::test]
async fn valid_token_verifies_end_to_end() {
    let store = store_with_user(None).await;
    let ring = Arc::new(ring("k1"));
    let token = ring.sign(&TokenClaims::new("u1", ISSUER, 600)).unwrap();

    let claims = verifier_over(store, ring).verify(&token).await.unwrap();
    assert_eq!(claims.sub, "u1");
}

#[tokio::test]
async fn wrong_issuer_is_rejected() {
    let store = store_with_user(None).await;
    let ring = Arc::new(ring("k1"));
    let token = ring
        .sign(&TokenClaims::new("u1", "https://elsewhere.example.com", 600))
        .unwrap();

    let err = verifier_over(store, ring).verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken { .. }));
    assert_eq!(err.public_message(), "Not authenticated");
}

#[tokio::test]
async fn token_issued_before_watermark_is_revoked() {
    let ring = Arc::new(ring("k1"));
    let mut claims = TokenClaims::new("u1", ISSUER, 600);
    claims.iat -= 1000;
    let token = ring.sign(&claims).unwrap();

    let store = store_with_user(Some((claims.iat + 1) as f64)).await;
    let err = verifier_over(store, ring).verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::Revoked));
}

#[tokio::test]
async fn watermark_is_floored_before_comparison() {
    let ring = Arc::new(ring("k1"));
    let claims = TokenClaims::new("u1", ISSUER, 600);
    let token = ring.sign(&claims).unwrap();

    // A fractional watermark in the same second as iat floors down, so the
    // token is still acceptable.
    let store = store_with_user(Some(claims.iat as f64 + 0.5)).await;
    verifier_over(store, ring).verify(&token).await.unwrap();
}

#[tokio::test]
async fn unknown_subject_is_rejected() {
    let ring = Arc::new(ring("k1"));
    let token = ring.sign(&TokenClaims::new("ghost", ISSUER, 600)).unwrap();

    let store = store_with_user(None).await;
    let err = verifier_over(store, ring).verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::Revoked));
}

#[tokio::test]
async fn revoke_all_invalidates_earlier_tokens_only() {
    let ring = Arc::new(ring("k1"));
    let mut old = TokenClaims::new("u1", ISSUER, 6000);
    old.iat -= 100;
    let old_token = ring.sign(&old).unwrap();

    let store = store_with_user(None).await;
    let directory = UserDirectory::new(store.clone());
    let guard = RevocationGuard::new(directory);
    let verifier = TokenVerifier::new(ring.clone(), guard.clone(), ISSUER);

    verifier.verify(&old_token).await.unwrap();
    guard.revoke_all("u1").await.unwrap();
    let err = verifier.verify(&old_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    // A token minted at or after the watermark passes.
    let fresh = ring.sign(&TokenClaims::new("u1", ISSUER, 600)).unwrap();
    verifier.verify(&fresh).await.unwrap();
}

#[tokio::test]
async fn revoking_missing_subject_fails_loudly() {
    let store = store_with_user(None).await;
    let guard = RevocationGuard::new(UserDirectory::new(store));
    let err = guard.revoke_all("ghost").await.unwrap_err();
    assert!(matches!(err, AuthError::SubjectNotFound { .. }));
}

#[tokio::test]
async fn token_signed_by_rotated_out_key_is_unknown() {
    let old_ring = ring("gen-1");
    let token = old_ring.sign(&TokenClaims::new("u1", ISSUER, 600)).unwrap();

    let store = store_with_user(None).await;
    let err = verifier_over(store, Arc::new(ring("gen-2")))
        .verify(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnknownKey { .. }));
    assert_eq!(err.public_message(), "Not authenticated");
}

async fn seed_roles_and_policies(store: &MemoryDocumentStore) {
    for (id, name) in [("r1", "admin"), ("r2", "editor")] {
        store
            .create(ROLES_COLLECTION, id, &json!({"id": id, "name": name}))
            .await
            .unwrap();
    }
    for (id, role_id) in [("ur1", "r1"), ("ur2", "r2")] {
        store
            .create(
                USER_ROLES_COLLECTION,
                id,
                &json!({"id": id, "user_id": "u1", "role_id": role_id}),
            )
            .await
            .unwrap();
    }
    for (id, name, effect) in [
        ("p1", "manage-users", "allow"),
        ("p2", "read-content", "allow"),
        ("p3", "write-content", "allow"),
    ] {
        store
            .create(
                POLICIES_COLLECTION,
                id,
                &json!({
                    "id": id,
                    "name": name,
                    "effect": effect,
                    "resources": ["*"],
                    "actions": ["*"]
                }),
            )
            .await
            .unwrap();
    }
    // p2 hangs off both roles; it must appear once, at its first position.
    for (id, role_id, policy_id) in [
        ("rp1", "r1", "p1"),
        ("rp2", "r1", "p2"),
        ("rp3", "r2", "p2"),
        ("rp4", "r2", "p3"),
    ] {
        store
            .create(
                ROLE_POLICIES_COLLECTION,
                id,
                &json!({"id": id, "role_id": role_id, "policy_id": policy_id}),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn assembled_claims_dedupe_policies_by_id() {
    let store = store_with_user(None).await;
    seed_roles_and_policies(&store).await;

    let assembler = ClaimsAssembler::new(UserDirectory::new(store));
    let authz = assembler.assemble("u1").await.unwrap();

    assert_eq!(authz.roles, ["admin", "editor"]);
    let policy_ids: Vec<&str> = authz.policies.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(policy_ids, ["p1", "p2", "p3"]);
}

#[tokio::test]
async fn assembling_for_missing_subject_is_fatal() {
    let store = store_with_user(None).await;
    let assembler = ClaimsAssembler::new(UserDirectory::new(store));
    let err = assembler.assemble("ghost").await.unwrap_err();
    assert!(matches!(err, AuthError::SubjectNotFound { .. }));
}

#[tokio::test]
async fn subject_with_no_roles_gets_empty_claims() {
    let store = store_with_user(None).await;
    let assembler = ClaimsAssembler::new(UserDirectory::new(store));
    let authz = assembler.assemble("u1").await.unwrap();
    assert!(authz.roles.is_empty());
    assert!(authz.policies.is_empty());
}

#[tokio::test]
async fn signed_claims_round_trip_authz_namespace() {
    let store = store_with_user(None).await;
    seed_roles_and_policies(&store).await;

    let assembler = ClaimsAssembler::new(UserDirectory::new(store.clone()));
    let authz = assembler.assemble("u1").await.unwrap();

    let ring = Arc::new(ring("k1"));
    let token = ring
        .sign(&TokenClaims::new("u1", ISSUER, 600).with_authz(authz))
        .unwrap();

    let claims = verifier_over(store, ring).verify(&token).await.unwrap();
    let authz = claims.authz.unwrap();
    assert_eq!(authz.roles, ["admin", "editor"]);
    assert_eq!(authz.policies.len(), 3);
}
