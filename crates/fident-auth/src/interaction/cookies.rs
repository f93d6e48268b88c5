//! Scoped client-side credentials for the login round trip and the
//! established session.
//!
//! Handshake cookies (CSRF state, PKCE verifier) live for ten minutes and
//! use `SameSite=Lax` so they survive the top-level redirect back from the
//! authorization endpoint. Session cookies use `SameSite=Strict`, the
//! configured name prefix, and each token's own configured lifetime.
//! Everything is `HttpOnly`; `Secure` is on unless the process runs in
//! local-development mode.

use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};

use crate::config::TokenTtls;
use crate::interaction::flow::SessionTokens;

/// Name of the CSRF state handshake cookie.
pub const STATE_COOKIE: &str = "oidc_state";
/// Name of the PKCE verifier handshake cookie.
pub const VERIFIER_COOKIE: &str = "oidc_code_verifier";
/// Lifetime of the handshake cookies, seconds.
pub const HANDSHAKE_TTL_SECS: i64 = 600;

/// Suffixes of the session cookies, combined with the configured prefix.
const ACCESS_SUFFIX: &str = "access_token";
const REFRESH_SUFFIX: &str = "refresh_token";
const ID_SUFFIX: &str = "id_token";

/// A batch of cookie changes for the caller to apply to its response.
#[derive(Debug, Default)]
pub struct CookieJarUpdate {
    /// Cookies to set or remove (removals carry an expired `Max-Age`).
    pub cookies: Vec<Cookie<'static>>,
}

impl CookieJarUpdate {
    fn push(&mut self, cookie: Cookie<'static>) {
        self.cookies.push(cookie);
    }
}

/// Builds the handshake cookies set when a login attempt starts.
#[must_use]
pub fn handshake_cookies(state: &str, verifier: &str, secure: bool) -> CookieJarUpdate {
    let mut update = CookieJarUpdate::default();
    update.push(handshake_cookie(STATE_COOKIE, state, secure));
    update.push(handshake_cookie(VERIFIER_COOKIE, verifier, secure));
    update
}

/// Builds removals for the handshake cookies; applied on every completion,
/// successful or not, so a finished round trip leaves no handshake state
/// behind.
#[must_use]
pub fn clear_handshake_cookies() -> CookieJarUpdate {
    let mut update = CookieJarUpdate::default();
    update.push(removal(STATE_COOKIE));
    update.push(removal(VERIFIER_COOKIE));
    update
}

/// Builds the session cookies for a successful exchange. Each cookie lives
/// exactly as long as the token it carries is configured to.
#[must_use]
pub fn session_cookies(
    prefix: &str,
    tokens: &SessionTokens,
    ttls: &TokenTtls,
    secure: bool,
) -> CookieJarUpdate {
    let mut update = CookieJarUpdate::default();
    update.push(session_cookie(
        format!("{prefix}{ACCESS_SUFFIX}"),
        tokens.access_token.clone(),
        ttls.access,
        secure,
    ));
    if let Some(refresh) = &tokens.refresh_token {
        update.push(session_cookie(
            format!("{prefix}{REFRESH_SUFFIX}"),
            refresh.clone(),
            ttls.refresh,
            secure,
        ));
    }
    if let Some(id) = &tokens.id_token {
        update.push(session_cookie(
            format!("{prefix}{ID_SUFFIX}"),
            id.clone(),
            ttls.id,
            secure,
        ));
    }
    update
}

/// Builds removals for every session cookie; the whole of logout on the
/// client side.
#[must_use]
pub fn clear_session_cookies(prefix: &str) -> CookieJarUpdate {
    let mut update = CookieJarUpdate::default();
    for suffix in [ACCESS_SUFFIX, REFRESH_SUFFIX, ID_SUFFIX] {
        update.push(removal(format!("{prefix}{suffix}")));
    }
    update
}

fn handshake_cookie(name: &'static str, value: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(HANDSHAKE_TTL_SECS))
        .build()
}

fn session_cookie(name: String, value: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_secs as i64))
        .build()
}

fn removal(name: impl Into<String>) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.into(), String::new())).path("/").build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SessionTokens {
        SessionTokens {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            id_token: Some("idt".to_string()),
            expires_in: Some(3600),
        }
    }

    #[test]
    fn test_handshake_cookies_are_lax_and_short_lived() {
        let update = handshake_cookies("st", "ver", true);
        assert_eq!(update.cookies.len(), 2);
        for cookie in &update.cookies {
            assert_eq!(cookie.same_site(), Some(SameSite::Lax));
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(
                cookie.max_age(),
                Some(CookieDuration::seconds(HANDSHAKE_TTL_SECS))
            );
        }
    }

    #[test]
    fn test_session_cookies_use_prefix_and_strict() {
        let update = session_cookies("fidt_", &tokens(), &TokenTtls::default(), true);
        let names: Vec<&str> = update.cookies.iter().map(Cookie::name).collect();
        assert_eq!(
            names,
            ["fidt_access_token", "fidt_refresh_token", "fidt_id_token"]
        );
        for cookie in &update.cookies {
            assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        }
    }

    #[test]
    fn test_each_session_cookie_gets_its_own_lifetime() {
        let ttls = TokenTtls {
            access: 3600,
            refresh: 2_592_000,
            id: 7200,
        };
        let update = session_cookies("fidt_", &tokens(), &ttls, true);
        let max_age = |name: &str| {
            update
                .cookies
                .iter()
                .find(|c| c.name() == name)
                .unwrap()
                .max_age()
                .unwrap()
        };
        assert_eq!(max_age("fidt_access_token"), CookieDuration::seconds(3600));
        assert_eq!(
            max_age("fidt_refresh_token"),
            CookieDuration::seconds(2_592_000)
        );
        assert_eq!(max_age("fidt_id_token"), CookieDuration::seconds(7200));
    }

    #[test]
    fn test_dev_mode_drops_secure_attribute() {
        let update = session_cookies("fidt_", &tokens(), &TokenTtls::default(), false);
        for cookie in &update.cookies {
            assert_ne!(cookie.secure(), Some(true));
            // HttpOnly stays on either way.
            assert_eq!(cookie.http_only(), Some(true));
        }
        let update = handshake_cookies("st", "ver", false);
        for cookie in &update.cookies {
            assert_ne!(cookie.secure(), Some(true));
        }
    }

    #[test]
    fn test_optional_tokens_get_no_cookie() {
        let tokens = SessionTokens {
            access_token: "at".to_string(),
            refresh_token: None,
            id_token: None,
            expires_in: None,
        };
        let update = session_cookies("fidt_", &tokens, &TokenTtls::default(), true);
        assert_eq!(update.cookies.len(), 1);
    }

    #[test]
    fn test_clear_session_cookies_expire_everything() {
        let update = clear_session_cookies("fidt_");
        assert_eq!(update.cookies.len(), 3);
        for cookie in &update.cookies {
            // Removal cookies carry an already-elapsed expiry.
            assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        }
    }
}
