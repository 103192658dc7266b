// src/auth/gate.rs
//! Session gate middleware
//!
//! Runs on every request: verifies the access token, transparently refreshes
//! an expired one when a valid refresh token is present, and attaches the
//! resolved identity to the request for the route extractors. The route
//! handler never sees the refresh happen; the fresh pair rides back on the
//! response via whichever transport the request used (cookies for browsers,
//! `x-access-token`/`x-refresh-token` headers for bearer callers).

use axum::{
    extract::{Extension, Request},
    http::{
        header::{AUTHORIZATION, SET_COOKIE},
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use super::models::{CurrentUser, TokenPair};
use super::tokens::TokenError;
use crate::common::{safe_token_log, AppState};

/// Where the request carried its credentials, which decides where the
/// refreshed pair is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Cookie,
    Header,
}

/// Result of running the gate for one request.
#[derive(Debug, Default)]
pub struct GateOutcome {
    /// Authenticated identity, if any. Routes decide required vs optional.
    pub identity: Option<CurrentUser>,
    /// Fresh pair minted by a transparent refresh.
    pub issued: Option<TokenPair>,
    /// Clear auth cookies: credentials were present but unusable.
    pub clear: bool,
}

pub async fn session_gate(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let state = state_lock.read().await.clone();

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let (access, transport) = match bearer {
        Some(token) => (Some(token), Transport::Header),
        None => (
            jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()),
            Transport::Cookie,
        ),
    };

    let refresh = match transport {
        Transport::Header => request
            .headers()
            .get("x-refresh-token")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        Transport::Cookie => jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()),
    };

    let outcome = authenticate(&state, access.as_deref(), refresh.as_deref()).await;

    if let Some(user) = &outcome.identity {
        request.extensions_mut().insert(user.clone());
    }

    let mut response = next.run(request).await;

    // Routes that manage auth cookies themselves (callback, refresh, logout)
    // win over the gate: re-issuing a pair after logout just cleared it would
    // resurrect the session.
    if response.headers().contains_key(SET_COOKIE) {
        return response;
    }

    if outcome.clear && transport == Transport::Cookie {
        append_cookie(&mut response, cookies::removal_cookie(ACCESS_COOKIE));
        append_cookie(&mut response, cookies::removal_cookie(REFRESH_COOKIE));
    }

    if let Some(pair) = outcome.issued {
        match transport {
            Transport::Cookie => {
                for cookie in cookies::token_pair_cookies(&pair, state.config.secure_cookies) {
                    append_cookie(&mut response, cookie);
                }
            }
            Transport::Header => {
                set_token_header(&mut response, "x-access-token", &pair.access_token);
                set_token_header(&mut response, "x-refresh-token", &pair.refresh_token);
            }
        }
    }

    response
}

/// Core gate decision, separated from the HTTP plumbing so it can be tested
/// against an in-memory store.
pub async fn authenticate(
    state: &AppState,
    access: Option<&str>,
    refresh: Option<&str>,
) -> GateOutcome {
    let Some(access) = access else {
        return GateOutcome::default();
    };

    match state.tokens.verify_access(access) {
        Ok(claims) => match state.resolver.fetch_user(&claims.sub).await {
            Ok(Some(user)) if user.is_active => GateOutcome {
                identity: Some(CurrentUser::from_record(&user)),
                ..Default::default()
            },
            Ok(_) => {
                // Deactivated or deleted since the token was minted
                warn!(user_id = %claims.sub, "Rejected token for inactive or missing account");
                GateOutcome {
                    clear: true,
                    ..Default::default()
                }
            }
            Err(e) => {
                // Transient store failure: the live lookup is a freshness
                // optimization, not the sole authorization source, so fall
                // back to the token's own claims.
                warn!(error = %e, user_id = %claims.sub, "User freshness check failed, using token claims");
                GateOutcome {
                    identity: Some(CurrentUser::from_claims(&claims)),
                    ..Default::default()
                }
            }
        },
        Err(TokenError::Expired) => match refresh {
            Some(refresh) => refresh_session(state, refresh).await,
            None => {
                debug!("Access token expired and no refresh token present");
                GateOutcome::default()
            }
        },
        Err(TokenError::Invalid) => {
            // Bad signature, not just expiry: possible tampering or a token
            // signed with a rotated-out secret.
            warn!(
                token = %safe_token_log(access),
                "Rejected access token with invalid signature"
            );
            GateOutcome {
                clear: true,
                ..Default::default()
            }
        }
    }
}

async fn refresh_session(state: &AppState, refresh: &str) -> GateOutcome {
    let claims = match state.tokens.verify_refresh(refresh) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Refresh token rejected");
            return GateOutcome {
                clear: true,
                ..Default::default()
            };
        }
    };

    let user = match state.resolver.fetch_user(&claims.sub).await {
        Ok(Some(user)) if user.is_active => user,
        Ok(_) => {
            warn!(user_id = %claims.sub, "Refresh rejected for inactive or missing account");
            return GateOutcome {
                clear: true,
                ..Default::default()
            };
        }
        Err(e) => {
            // Cannot confirm the account is still active; leave the cookies
            // alone so the client can retry once the store recovers.
            warn!(error = %e, user_id = %claims.sub, "User lookup failed during refresh");
            return GateOutcome::default();
        }
    };

    match state.tokens.generate_pair(&user.id, &user.email) {
        Ok(pair) => {
            debug!(user_id = %user.id, "Transparently refreshed session");
            GateOutcome {
                identity: Some(CurrentUser::from_record(&user)),
                issued: Some(pair),
                clear: false,
            }
        }
        Err(e) => {
            error!(error = %e, user_id = %user.id, "Failed to sign refreshed token pair");
            GateOutcome::default()
        }
    }
}

fn append_cookie(response: &mut Response, cookie: axum_extra::extract::cookie::Cookie<'static>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

fn set_token_header(response: &mut Response, name: &'static str, token: &str) {
    if let Ok(value) = HeaderValue::from_str(token) {
        response.headers_mut().insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{OAuthProfile, Role};
    use crate::auth::providers::ProviderRegistry;
    use crate::auth::resolver::IdentityResolver;
    use crate::auth::tokens::TokenService;
    use crate::common::config::AuthConfig;
    use crate::common::migrations::run_migrations;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use sqlx::SqlitePool;

    async fn test_state() -> AppState {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        run_migrations(&pool).await.expect("Migrations failed");

        let config = AuthConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            github: None,
            google: None,
            secure_cookies: false,
        };

        AppState {
            db: pool.clone(),
            http: reqwest::Client::new(),
            tokens: TokenService::new(
                config.access_secret.clone(),
                config.refresh_secret.clone(),
            ),
            resolver: IdentityResolver::new(pool),
            providers: ProviderRegistry::empty(),
            config,
        }
    }

    async fn seed_user(state: &AppState) -> crate::auth::models::User {
        state
            .resolver
            .resolve(&OAuthProfile {
                provider: "github".to_string(),
                provider_id: "123".to_string(),
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
            })
            .await
            .unwrap()
    }

    fn expired_access_token(user_id: &str, email: &str) -> String {
        let claims = crate::auth::models::Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (Utc::now() - Duration::minutes(2)).timestamp() as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_credential_is_unauthenticated() {
        let state = test_state().await;
        let outcome = authenticate(&state, None, None).await;
        assert!(outcome.identity.is_none());
        assert!(!outcome.clear);
    }

    #[tokio::test]
    async fn test_valid_access_token_attaches_live_identity() {
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();

        let outcome = authenticate(&state, Some(&pair.access_token), None).await;
        let identity = outcome.identity.expect("expected identity");
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.role, Some(Role::Member));
        assert!(outcome.issued.is_none());
    }

    #[tokio::test]
    async fn test_expired_access_with_valid_refresh_is_transparent() {
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();
        let expired = expired_access_token(&user.id, &user.email);

        let outcome = authenticate(&state, Some(&expired), Some(&pair.refresh_token)).await;
        let identity = outcome.identity.expect("expected refreshed identity");
        assert_eq!(identity.id, user.id);

        let issued = outcome.issued.expect("expected a fresh pair");
        assert!(state.tokens.verify_access(&issued.access_token).is_ok());
        assert!(state.tokens.verify_refresh(&issued.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_both_succeed() {
        // No single-use rotation: an old refresh token stays valid after a
        // newer refresh has superseded it.
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();
        let expired = expired_access_token(&user.id, &user.email);

        let first = authenticate(&state, Some(&expired), Some(&pair.refresh_token)).await;
        let second = authenticate(&state, Some(&expired), Some(&pair.refresh_token)).await;
        assert!(first.issued.is_some());
        assert!(second.issued.is_some());
    }

    #[tokio::test]
    async fn test_expired_access_without_refresh_falls_through() {
        let state = test_state().await;
        let user = seed_user(&state).await;
        let expired = expired_access_token(&user.id, &user.email);

        let outcome = authenticate(&state, Some(&expired), None).await;
        assert!(outcome.identity.is_none());
        assert!(!outcome.clear);
    }

    #[tokio::test]
    async fn test_store_error_falls_back_to_claims() {
        // The live lookup is a freshness check, not the authorization source:
        // when the store is down, a cryptographically valid access token
        // still authenticates, but carries no role.
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();

        state.db.close().await;

        let outcome = authenticate(&state, Some(&pair.access_token), None).await;
        let identity = outcome.identity.expect("expected claims-derived identity");
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.email, user.email);
        assert_eq!(identity.role, None);
        assert!(!outcome.clear);
        assert!(outcome.issued.is_none());
    }

    #[tokio::test]
    async fn test_invalid_signature_clears_credentials() {
        let state = test_state().await;

        let outcome = authenticate(&state, Some("not-a-valid-token"), None).await;
        assert!(outcome.identity.is_none());
        assert!(outcome.clear);
    }

    #[tokio::test]
    async fn test_inactive_user_is_blocked_on_both_paths() {
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(&user.id)
            .execute(&state.db)
            .await
            .unwrap();

        // Live check catches it mid-lifetime
        let outcome = authenticate(&state, Some(&pair.access_token), None).await;
        assert!(outcome.identity.is_none());
        assert!(outcome.clear);

        // Refresh path re-checks too
        let expired = expired_access_token(&user.id, &user.email);
        let outcome = authenticate(&state, Some(&expired), Some(&pair.refresh_token)).await;
        assert!(outcome.identity.is_none());
        assert!(outcome.clear);
    }

    #[tokio::test]
    async fn test_role_change_is_picked_up_live() {
        let state = test_state().await;
        let user = seed_user(&state).await;
        let pair = state.tokens.generate_pair(&user.id, &user.email).unwrap();

        sqlx::query("UPDATE users SET role = 'OWNER' WHERE id = ?")
            .bind(&user.id)
            .execute(&state.db)
            .await
            .unwrap();

        let outcome = authenticate(&state, Some(&pair.access_token), None).await;
        assert_eq!(outcome.identity.unwrap().role, Some(Role::Owner));
    }
}
