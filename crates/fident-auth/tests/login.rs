//! Credential-check scenarios for the login prompt: enumeration-safe
//! rejections and the password-before-status ordering.

use std::sync::Arc;

use serde_json::json;

use fident_auth::AuthError;
use fident_auth::directory::{USERS_COLLECTION, UserDirectory};
use fident_auth::interaction::LoginService;
use fident_auth::password::PasswordVerifier;
use fident_auth::store::DocumentStore;
use fident_store_memory::MemoryDocumentStore;

/// Accepts exactly one plaintext, whatever the hash says.
struct FixedPassword(&'static str);

impl PasswordVerifier for FixedPassword {
    fn verify(&self, plaintext: &str, _hash: &str) -> bool {
        plaintext == self.0
    }
}

async fn service_with_users(users: &[serde_json::Value]) -> LoginService {
    let store = Arc::new(MemoryDocumentStore::new());
    for user in users {
        let id = user["id"].as_str().unwrap();
        store.create(USERS_COLLECTION, id, user).await.unwrap();
    }
    LoginService::new(
        UserDirectory::new(store),
        Arc::new(FixedPassword("hunter2")),
    )
}

#[tokio::test]
async fn valid_credentials_return_user() {
    let service = service_with_users(&[json!({
        "id": "u1",
        "email": "a@example.com",
        "password_hash": "$stored",
        "status": "active"
    })])
    .await;
    let user = service
        .authenticate("a@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(user.id, "u1");
}

#[tokio::test]
async fn unknown_email_rejected() {
    let service = service_with_users(&[]).await;
    let err = service
        .authenticate("ghost@example.com", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn wrong_password_rejected() {
    let service = service_with_users(&[json!({
        "id": "u1",
        "email": "a@example.com",
        "password_hash": "$stored",
        "status": "active"
    })])
    .await;
    let err = service
        .authenticate("a@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn suspended_account_rejected_after_password() {
    let service = service_with_users(&[json!({
        "id": "u1",
        "email": "a@example.com",
        "password_hash": "$stored",
        "status": "suspended"
    })])
    .await;
    let err = service
        .authenticate("a@example.com", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountSuspended));
    // Wrong password on a suspended account reads as bad credentials, not
    // as "this account exists but is suspended".
    let err = service
        .authenticate("a@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn missing_hash_rejected() {
    let service = service_with_users(&[json!({
        "id": "u1",
        "email": "a@example.com",
        "status": "active"
    })])
    .await;
    let err = service
        .authenticate("a@example.com", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn credential_failures_share_public_message() {
    let service = service_with_users(&[json!({
        "id": "u1",
        "email": "a@example.com",
        "password_hash": "$stored",
        "status": "suspended"
    })])
    .await;
    let suspended = service
        .authenticate("a@example.com", "hunter2")
        .await
        .unwrap_err();
    let unknown = service
        .authenticate("ghost@example.com", "hunter2")
        .await
        .unwrap_err();
    assert_eq!(suspended.public_message(), unknown.public_message());
}
