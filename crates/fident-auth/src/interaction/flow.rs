//! The CSRF/PKCE-bound login round trip.
//!
//! One login attempt moves through three steps:
//!
//! 1. [`begin`](InteractionFlow::begin) - generate state and PKCE
//!    material, hand back the authorization redirect plus the handshake
//!    cookies that carry the material across the round trip.
//! 2. [`complete`](InteractionFlow::complete) - on callback, enforce the
//!    CSRF and PKCE preconditions, then exchange the code at the token
//!    endpoint.
//! 3. On success the handshake cookies are cleared and session cookies
//!    set; on any failure the attempt is terminal and no session exists.

use serde::Deserialize;
use url::Url;

use crate::AuthResult;
use crate::config::{AuthConfig, TokenTtls};
use crate::error::AuthError;
use crate::interaction::cookies::{
    CookieJarUpdate, clear_handshake_cookies, clear_session_cookies, handshake_cookies,
    session_cookies,
};
use crate::interaction::pkce;

/// The outcome of starting a login attempt.
#[derive(Debug)]
pub struct LoginStart {
    /// Where to send the browser.
    pub redirect_url: Url,
    /// Handshake cookies to set on the redirect response.
    pub cookies: CookieJarUpdate,
}

/// Query parameters the authorization endpoint sends to the callback.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    /// The authorization code, present on success.
    pub code: Option<String>,
    /// Echo of the CSRF state.
    pub state: Option<String>,
    /// Error code, present when the upstream refused.
    pub error: Option<String>,
    /// Human-readable error detail.
    pub error_description: Option<String>,
}

/// Tokens returned by the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    /// The access token.
    pub access_token: String,
    /// Refresh token, if the grant included one.
    pub refresh_token: Option<String>,
    /// ID token, if `openid` scope was granted.
    pub id_token: Option<String>,
    /// Access token lifetime reported by the endpoint, seconds.
    pub expires_in: Option<u64>,
}

/// A completed login: tokens plus the cookie changes to apply.
#[derive(Debug)]
pub struct SessionEstablished {
    /// The exchanged tokens.
    pub tokens: SessionTokens,
    /// Handshake removals plus session cookies.
    pub cookies: CookieJarUpdate,
}

/// Drives the login round trip against the external authorization and
/// token endpoints.
pub struct InteractionFlow {
    http: reqwest::Client,
    authorize_endpoint: Url,
    token_endpoint: Url,
    redirect_uri: Url,
    client_id: String,
    client_secret: String,
    cookie_prefix: String,
    session_ttls: TokenTtls,
    cookies_secure: bool,
}

impl InteractionFlow {
    /// Creates a flow from configuration and the engine's endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the public URL cannot
    /// anchor the callback route.
    pub fn new(
        config: &AuthConfig,
        authorize_endpoint: Url,
        token_endpoint: Url,
    ) -> Result<Self, AuthError> {
        let redirect_uri = Url::parse(&config.public_url)
            .and_then(|base| base.join("/auth/callback"))
            .map_err(|e| {
                AuthError::configuration(format!("unusable FIDENT_PUBLIC_URL: {e}"))
            })?;
        Ok(Self {
            http: reqwest::Client::new(),
            authorize_endpoint,
            token_endpoint,
            redirect_uri,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cookie_prefix: config.cookie_prefix.clone(),
            session_ttls: config.ttls,
            cookies_secure: config.cookies_secure(),
        })
    }

    /// Starts a login attempt: fresh state and PKCE material, an
    /// authorization redirect carrying the S256 challenge, and the
    /// handshake cookies.
    #[must_use]
    pub fn begin(&self) -> LoginStart {
        let state = pkce::generate_state();
        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge_s256(&verifier);

        let mut redirect_url = self.authorize_endpoint.clone();
        redirect_url
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", "openid profile email")
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        tracing::debug!("login attempt initiated");
        LoginStart {
            redirect_url,
            cookies: handshake_cookies(&state, &verifier, self.cookies_secure),
        }
    }

    /// Completes a login attempt from the callback.
    ///
    /// `stored_state` and `stored_verifier` are the handshake cookie
    /// values presented by the browser, if any survived.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCallback`] if the upstream reported an error
    ///   or sent no code
    /// - [`AuthError::CsrfMismatch`] if the echoed state is missing or
    ///   does not exactly match the stored state
    /// - [`AuthError::MissingVerifier`] if the stored verifier is gone
    /// - [`AuthError::ExchangeFailed`] if the token endpoint refuses the
    ///   code/verifier pair
    ///
    /// All are terminal: the attempt is over and no session exists. The
    /// handshake cookies should be cleared regardless (see
    /// [`abandon_cookies`](Self::abandon_cookies)).
    pub async fn complete(
        &self,
        params: &CallbackParams,
        stored_state: Option<&str>,
        stored_verifier: Option<&str>,
    ) -> AuthResult<SessionEstablished> {
        if let Some(error) = &params.error {
            let detail = params.error_description.as_deref().unwrap_or("");
            return Err(AuthError::invalid_callback(format!(
                "upstream error: {error} {detail}"
            )));
        }
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_callback("missing authorization code"))?;

        // Exact match against the stored state; anything else is CSRF.
        match (params.state.as_deref(), stored_state) {
            (Some(returned), Some(stored)) if returned == stored => {}
            _ => return Err(AuthError::CsrfMismatch),
        }
        let verifier = stored_verifier.ok_or(AuthError::MissingVerifier)?;

        let tokens = self.exchange(code, verifier).await?;
        tracing::info!("login attempt completed, session established");

        let mut cookies = clear_handshake_cookies();
        cookies.cookies.extend(
            session_cookies(
                &self.cookie_prefix,
                &tokens,
                &self.session_ttls,
                self.cookies_secure,
            )
            .cookies,
        );
        Ok(SessionEstablished { tokens, cookies })
    }

    /// Cookie removals to apply when an attempt terminates without a
    /// session, so no handshake state outlives the round trip.
    #[must_use]
    pub fn abandon_cookies(&self) -> CookieJarUpdate {
        clear_handshake_cookies()
    }

    /// Cookie removals that end the established session on the client.
    #[must_use]
    pub fn logout_cookies(&self) -> CookieJarUpdate {
        clear_session_cookies(&self.cookie_prefix)
    }

    async fn exchange(&self, code: &str, verifier: &str) -> AuthResult<SessionTokens> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("code_verifier", verifier),
        ];
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::exchange_failed(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "code exchange refused");
            return Err(AuthError::exchange_failed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::exchange_failed(format!("malformed token response: {e}")))
    }
}
