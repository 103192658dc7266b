//! Authentication handlers
//!
//! The OAuth orchestrator: login start, provider callback, refresh, logout
//! and session introspection. Errors at the start endpoint surface as JSON
//! envelopes; errors inside the browser-redirect flow are translated into a
//! redirect to the frontend error page with a short machine-readable code,
//! because the user-agent mid-redirect expects a page navigation, not an API
//! error body.

use axum::extract::{rejection::JsonRejection, Extension, Query};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::cookies::{self, OAUTH_STATE_COOKIE, REFRESH_COOKIE};
use super::error::AuthError;
use super::extractors::{AuthedUser, MaybeUser};
use super::models::{TokenPair, User};
use crate::common::{generate_state_nonce, safe_email_log, ApiError, AppState};

#[derive(Deserialize)]
pub struct StartParams {
    #[serde(rename = "type")]
    pub provider: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// GET /auth/oauth?type={github|google}
///
/// Start of the login flow: validates the provider key, stores the CSRF
/// nonce + provider in the `oauth_state` cookie and redirects to the
/// provider's authorize URL. No redirect context exists yet, so an unknown
/// or unconfigured provider is a plain 400 JSON error.
pub async fn oauth_start(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<StartParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let app = state_lock.read().await.clone();

    let key = params.provider.unwrap_or_default();
    let provider = app.providers.get(&key).ok_or_else(|| {
        warn!(provider = %key, "Login start rejected: unknown or unconfigured provider");
        ApiError::BadRequest("unknown or unconfigured provider".to_string())
    })?;

    let nonce = generate_state_nonce();
    let jar = jar.add(cookies::oauth_state_cookie(
        &nonce,
        provider.name(),
        app.config.secure_cookies,
    ));

    info!(provider = %provider.name(), "Starting OAuth login flow");

    Ok((jar, Redirect::to(&provider.auth_url(&nonce))))
}

/// GET /auth/oauth/callback?code&state
///
/// Callback leg of the flow. All failure branches redirect to
/// `{frontend}/auth/error?message={code}`; success sets the token-pair
/// cookies and redirects to `{frontend}/auth/callback?provider=...`.
pub async fn oauth_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    let app = state_lock.read().await.clone();
    let frontend = app.config.frontend_url.clone();

    let state_cookie = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    // Single conceptual use: the state cookie is cleared no matter how this
    // request ends, so a replayed callback re-fails the match check.
    let jar = jar.remove(cookies::removal_cookie(OAUTH_STATE_COOKIE));

    match run_callback(&app, &params, state_cookie.as_deref()).await {
        Ok((user, pair, provider)) => {
            info!(
                user_id = %user.id,
                email = %safe_email_log(&user.email),
                provider = %provider,
                "User authenticated via OAuth"
            );
            let jar = cookies::token_pair_cookies(&pair, app.config.secure_cookies)
                .into_iter()
                .fold(jar, |jar, cookie| jar.add(cookie));
            let target = format!("{frontend}/auth/callback?provider={provider}");
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            warn!(error = %e, code = e.redirect_code(), "OAuth callback failed");
            let target = format!("{frontend}/auth/error?message={}", e.redirect_code());
            (jar, Redirect::to(&target)).into_response()
        }
    }
}

/// The callback protocol itself, as a discriminated result so every branch
/// is exhaustive and testable. Failures are terminal for the request; the
/// orchestrator never retries a provider call.
async fn run_callback(
    app: &AppState,
    params: &CallbackParams,
    state_cookie: Option<&str>,
) -> Result<(User, TokenPair, String), AuthError> {
    // The provider itself can bounce back with an error (user denied consent)
    if let Some(provider_error) = &params.error {
        warn!(oauth_error = %provider_error, "Provider returned error on callback");
        return Err(AuthError::ExchangeFailed(format!(
            "provider error: {provider_error}"
        )));
    }

    let (code, query_state) = match (&params.code, &params.state) {
        (Some(code), Some(state)) => (code, state),
        _ => return Err(AuthError::InvalidRequest),
    };

    // CSRF core invariant: the callback nonce must byte-equal the cookie nonce
    let provider_key = cookies::validate_state(state_cookie, query_state)?;

    // START validated the provider, but defend against config drift between
    // the redirect and the callback
    let provider = app
        .providers
        .get(&provider_key)
        .ok_or(AuthError::InvalidProvider)?;

    let provider_token = provider.exchange_code(code).await?;
    let profile = provider.fetch_user_info(&provider_token).await?;

    let user = app.resolver.resolve(&profile).await?;

    let pair = app
        .tokens
        .generate_pair(&user.id, &user.email)
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign token pair");
            AuthError::ExchangeFailed("token signing failed".to_string())
        })?;

    Ok((user, pair, provider_key))
}

/// POST /auth/refresh
///
/// Explicit refresh for clients that want to renew before expiry. Accepts the
/// refresh token from the cookie or a JSON body; failure clears the auth
/// cookies and returns 401.
pub async fn refresh(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let app = state_lock.read().await.clone();

    let body_token = match body {
        Ok(Json(req)) => req.refresh_token,
        // No body at all is fine, the cookie is the usual carrier
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) => {
            warn!(error = %rejection, "Malformed refresh request body");
            return ApiError::BadRequest("malformed request body".to_string()).into_response();
        }
    };

    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(body_token);

    let Some(token) = token else {
        return refresh_failure(jar);
    };

    let claims = match app.tokens.verify_refresh(&token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "Refresh rejected: invalid or expired refresh token");
            return refresh_failure(jar);
        }
    };

    let user = match app.resolver.fetch_user(&claims.sub).await {
        Ok(Some(user)) if user.is_active => user,
        Ok(_) => {
            warn!(user_id = %claims.sub, "Refresh rejected: inactive or missing account");
            return refresh_failure(jar);
        }
        Err(e) => {
            error!(error = %e, user_id = %claims.sub, "User lookup failed during refresh");
            return ApiError::DatabaseError(e).into_response();
        }
    };

    let pair = match app.tokens.generate_pair(&user.id, &user.email) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "Failed to sign refreshed token pair");
            return ApiError::InternalServer("token signing failed".to_string()).into_response();
        }
    };

    info!(user_id = %user.id, "Session refreshed");

    let jar = cookies::token_pair_cookies(&pair, app.config.secure_cookies)
        .into_iter()
        .fold(jar, |jar, cookie| jar.add(cookie));

    (
        jar,
        Json(serde_json::json!({
            "success": true,
            "message": "Session refreshed",
        })),
    )
        .into_response()
}

fn refresh_failure(jar: CookieJar) -> Response {
    let jar = jar
        .remove(cookies::removal_cookie(cookies::ACCESS_COOKIE))
        .remove(cookies::removal_cookie(cookies::REFRESH_COOKIE));
    (
        jar,
        ApiError::Unauthorized("invalid or expired refresh token".to_string()),
    )
        .into_response()
}

/// POST /auth/logout
///
/// Clears the auth cookies. Always succeeds; logging out an unauthenticated
/// client is not an error.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    info!("User logged out");
    let jar = jar
        .remove(cookies::removal_cookie(cookies::ACCESS_COOKIE))
        .remove(cookies::removal_cookie(cookies::REFRESH_COOKIE));
    (
        jar,
        Json(serde_json::json!({
            "success": true,
            "message": "Logged out",
        })),
    )
}

/// GET /auth/session
///
/// Session introspection for the frontend. Absence of authentication is a
/// valid response, not an error, so this is always 200.
pub async fn session(MaybeUser(user): MaybeUser) -> Json<serde_json::Value> {
    match user {
        Some(user) => Json(serde_json::json!({
            "success": true,
            "data": {
                "authenticated": true,
                "userId": user.id,
                "role": user.role,
            },
        })),
        None => Json(serde_json::json!({
            "success": true,
            "data": { "authenticated": false },
        })),
    }
}

/// GET /api/me
///
/// Returns the live user record and its linked providers for the
/// authenticated session.
pub async fn me(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let app = state_lock.read().await.clone();

    let user = app
        .resolver
        .fetch_user(&authed.id)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let links = app
        .resolver
        .links_for(&user.id)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "user": user,
            "identities": links,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::providers::ProviderRegistry;
    use crate::auth::resolver::IdentityResolver;
    use crate::auth::tokens::TokenService;
    use crate::common::config::AuthConfig;
    use crate::common::migrations::run_migrations;
    use sqlx::SqlitePool;

    async fn test_app() -> AppState {
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

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_callback_without_code_or_state_is_invalid_request() {
        let app = test_app().await;
        let cookie = Some("NONCE123:github");

        let result = run_callback(&app, &params(None, Some("NONCE123")), cookie).await;
        assert!(matches!(result, Err(AuthError::InvalidRequest)));

        let result = run_callback(&app, &params(Some("authcode"), None), cookie).await;
        assert!(matches!(result, Err(AuthError::InvalidRequest)));
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_issues_no_tokens() {
        let app = test_app().await;

        let result = run_callback(
            &app,
            &params(Some("authcode"), Some("NONCE999")),
            Some("NONCE123:github"),
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidState)));

        // Missing cookie is the same failure: nothing to match against
        let result = run_callback(&app, &params(Some("authcode"), Some("NONCE123")), None).await;
        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_callback_provider_drift_is_invalid_provider() {
        // The state cookie names a provider that is no longer registered
        let app = test_app().await;

        let result = run_callback(
            &app,
            &params(Some("authcode"), Some("NONCE123")),
            Some("NONCE123:github"),
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidProvider)));
    }

    #[tokio::test]
    async fn test_callback_provider_error_param_is_terminal() {
        let app = test_app().await;

        let denied = CallbackParams {
            code: Some("authcode".to_string()),
            state: Some("NONCE123".to_string()),
            error: Some("access_denied".to_string()),
        };
        let result = run_callback(&app, &denied, Some("NONCE123:github")).await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }
}
