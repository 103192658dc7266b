//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/oauth?type={github|google}` - Start OAuth login flow
/// - `GET /auth/oauth/callback` - Provider callback
/// - `POST /auth/refresh` - Explicit token refresh
/// - `POST /auth/logout` - Clear auth cookies
/// - `GET /auth/session` - Session introspection
/// - `GET /api/me` - Current user record
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/oauth", get(handlers::oauth_start))
        .route("/auth/oauth/callback", get(handlers::oauth_callback))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/session", get(handlers::session))
        .route("/api/me", get(handlers::me))
}
