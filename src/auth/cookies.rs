// src/auth/cookies.rs
//! Cookie builders and the OAuth state check
//!
//! All auth cookies are httpOnly with path=/ and `Secure` in production. The
//! `oauth_state` cookie carries both the CSRF nonce and the provider key for
//! the in-flight login, and lives at most ten minutes.

use axum_extra::extract::cookie::{Cookie, SameSite};
use subtle::ConstantTimeEq;
use time::Duration;

use super::error::AuthError;
use super::models::TokenPair;
use super::tokens::{ACCESS_TTL_MINUTES, REFRESH_TTL_DAYS};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

const OAUTH_STATE_TTL_MINUTES: i64 = 10;

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Login-flow cookie carrying `{nonce}:{provider}`.
///
/// Provider keys never contain `:` and the nonce alphabet is Crockford
/// Base32, so a plain separator is unambiguous.
pub fn oauth_state_cookie(nonce: &str, provider: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(OAUTH_STATE_COOKIE, format!("{nonce}:{provider}"), secure);
    cookie.set_max_age(Duration::minutes(OAUTH_STATE_TTL_MINUTES));
    cookie
}

pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(ACCESS_COOKIE, token.to_string(), secure);
    cookie.set_max_age(Duration::minutes(ACCESS_TTL_MINUTES));
    cookie
}

pub fn refresh_cookie(token: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(REFRESH_COOKIE, token.to_string(), secure);
    cookie.set_max_age(Duration::days(REFRESH_TTL_DAYS));
    cookie
}

pub fn token_pair_cookies(pair: &TokenPair, secure: bool) -> [Cookie<'static>; 2] {
    [
        access_cookie(&pair.access_token, secure),
        refresh_cookie(&pair.refresh_token, secure),
    ]
}

/// Expired replacement cookie, used to clear auth state on the client.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).http_only(true).path("/").build();
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Validate the callback `state` query value against the `oauth_state`
/// cookie. Returns the provider key stored at login start.
///
/// The nonce comparison is constant-time; an attacker probing the callback
/// must not learn a matching prefix from response timing.
pub fn validate_state(
    cookie_value: Option<&str>,
    query_state: &str,
) -> Result<String, AuthError> {
    let value = cookie_value.ok_or(AuthError::InvalidState)?;
    let (nonce, provider) = value.split_once(':').ok_or(AuthError::InvalidState)?;

    let matches: bool = nonce.as_bytes().ct_eq(query_state.as_bytes()).into();
    if !matches {
        return Err(AuthError::InvalidState);
    }

    Ok(provider.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cookie_attributes() {
        let cookie = oauth_state_cookie("NONCE", "github", true);
        assert_eq!(cookie.name(), OAUTH_STATE_COOKIE);
        assert_eq!(cookie.value(), "NONCE:github");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(10)));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_token_cookie_lifetimes() {
        let access = access_cookie("a.b.c", false);
        assert_eq!(access.max_age(), Some(Duration::minutes(15)));

        let refresh = refresh_cookie("a.b.c", false);
        assert_eq!(refresh.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn test_validate_state_match() {
        let provider = validate_state(Some("NONCE123:github"), "NONCE123").unwrap();
        assert_eq!(provider, "github");
    }

    #[test]
    fn test_validate_state_rejects_mismatch() {
        assert!(matches!(
            validate_state(Some("NONCE123:github"), "NONCE999"),
            Err(AuthError::InvalidState)
        ));
        // A matching prefix is still a mismatch
        assert!(matches!(
            validate_state(Some("NONCE123:github"), "NONCE12"),
            Err(AuthError::InvalidState)
        ));
    }

    #[test]
    fn test_validate_state_rejects_missing_or_malformed_cookie() {
        assert!(matches!(
            validate_state(None, "NONCE123"),
            Err(AuthError::InvalidState)
        ));
        assert!(matches!(
            validate_state(Some("no-separator"), "no-separator"),
            Err(AuthError::InvalidState)
        ));
    }
}
