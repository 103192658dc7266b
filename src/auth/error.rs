// src/auth/error.rs
//! Error taxonomy for the OAuth login flow
//!
//! Every orchestrator branch produces one of these variants; nothing in the
//! callback path panics or surfaces a raw HTTP error. Errors that occur while
//! the browser is mid-redirect are translated to a short machine-readable
//! code on the frontend error page via [`AuthError::redirect_code`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Required callback query parameters were missing or malformed.
    #[error("missing or malformed callback parameters")]
    InvalidRequest,

    /// CSRF check failed: state cookie absent or nonce mismatch.
    #[error("oauth state mismatch")]
    InvalidState,

    /// Unknown or unconfigured provider key.
    #[error("invalid or unconfigured provider")]
    InvalidProvider,

    /// Account exists but has been deactivated.
    #[error("account is deactivated")]
    InactiveUser,

    /// Code exchange or profile fetch against the provider failed.
    /// The detail is logged internally and never forwarded to the browser.
    #[error("oauth exchange failed: {0}")]
    ExchangeFailed(String),

    /// Provider account has no verified primary email. Hard stop: email is
    /// the cross-provider identity key, so an unverified address cannot be
    /// trusted to join accounts.
    #[error("no verified primary email on provider account")]
    NoVerifiedEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    /// Machine-readable code appended to the frontend error redirect.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest => "invalid_request",
            AuthError::InvalidState => "invalid_state",
            AuthError::InvalidProvider => "invalid_provider",
            AuthError::InactiveUser => "account_inactive",
            AuthError::ExchangeFailed(_)
            | AuthError::NoVerifiedEmail
            | AuthError::Database(_) => "oauth_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_codes() {
        assert_eq!(AuthError::InvalidRequest.redirect_code(), "invalid_request");
        assert_eq!(AuthError::InvalidState.redirect_code(), "invalid_state");
        assert_eq!(
            AuthError::InvalidProvider.redirect_code(),
            "invalid_provider"
        );
        assert_eq!(AuthError::InactiveUser.redirect_code(), "account_inactive");
        assert_eq!(
            AuthError::ExchangeFailed("boom".into()).redirect_code(),
            "oauth_failed"
        );
        assert_eq!(AuthError::NoVerifiedEmail.redirect_code(), "oauth_failed");
    }
}
