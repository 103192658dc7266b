// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode
//!
//! Bodies on token-carrying routes are never logged; a refresh token in a
//! debug log is as good as a session.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Routes whose bodies may carry credentials
fn is_sensitive(path: &str) -> bool {
    path.starts_with("/auth/refresh") || path.starts_with("/auth/oauth")
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let sensitive = is_sensitive(parts.uri.path());

    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() && !sensitive {
        if let Ok(body_str) = std::str::from_utf8(&bytes) {
            debug!(
                method = %parts.method,
                uri = %parts.uri,
                request_body = %body_str,
                "Request"
            );
        }
    } else {
        debug!(method = %parts.method, uri = %parts.uri, "Request");
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() && !sensitive {
        if let Ok(body_str) = std::str::from_utf8(&bytes) {
            debug!(status = %parts.status, response_body = %body_str, "Response");
        }
    } else {
        debug!(status = %parts.status, "Response");
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
