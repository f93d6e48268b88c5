//! Username/password verification behind the login prompt.
//!
//! Stateless: one directory lookup, one hash check, one status check.
//! Both failure modes report the same public message so responses cannot
//! be used to enumerate accounts.

use std::sync::Arc;

use crate::AuthResult;
use crate::directory::{User, UserDirectory};
use crate::error::AuthError;
use crate::password::PasswordVerifier;

/// Credential check for the login prompt.
#[derive(Clone)]
pub struct LoginService {
    directory: UserDirectory,
    passwords: Arc<dyn PasswordVerifier>,
}

impl LoginService {
    /// Creates a login service over the user directory.
    #[must_use]
    pub fn new(directory: UserDirectory, passwords: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            directory,
            passwords,
        }
    }

    /// Verifies an email/password pair.
    ///
    /// The password is checked before the account status so the two
    /// rejection paths take comparable work.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] if the subject is unknown, has
    ///   no usable hash, or the password does not match
    /// - [`AuthError::AccountSuspended`] if the subject is not active
    /// - a storage error if the lookup fails
    ///
    /// Callers must surface credential failures through
    /// [`AuthError::public_message`], which collapses both to one text.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<User> {
        let Some(user) = self.directory.find_by_email(email).await? else {
            tracing::debug!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "login rejected: no password hash");
            return Err(AuthError::InvalidCredentials);
        };
        if !self.passwords.verify(password, hash) {
            tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active() {
            tracing::debug!(user_id = %user.id, "login rejected: account not active");
            return Err(AuthError::AccountSuspended);
        }
        tracing::info!(user_id = %user.id, "login credentials verified");
        Ok(user)
    }
}

