// src/auth/tokens.rs
//! JWT signing and verification for the access/refresh token pair
//!
//! Stateless: validity is purely cryptographic. The two secrets are loaded
//! once at startup and never mutated; there is no revocation list, so a token
//! stays valid for its natural TTL until a secret is rotated or the user is
//! deactivated (the session gate re-checks `is_active` on every request).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::error;

use super::models::{Claims, TokenPair};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TTL_MINUTES: i64 = 15;
/// Refresh token lifetime: 7 days.
pub const REFRESH_TTL_DAYS: i64 = 7;

/// Verification failure, split so callers can branch: an expired access token
/// is refreshable, an invalid one is rejected outright.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,
}

#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
}

impl TokenService {
    pub fn new(access_secret: String, refresh_secret: String) -> Self {
        Self {
            access_secret,
            refresh_secret,
        }
    }

    /// Sign a fresh access/refresh pair carrying the same minimal claim set.
    pub fn generate_pair(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        let access_token = sign(
            user_id,
            email,
            Duration::minutes(ACCESS_TTL_MINUTES),
            &self.access_secret,
        )?;
        let refresh_token = sign(
            user_id,
            email,
            Duration::days(REFRESH_TTL_DAYS),
            &self.refresh_secret,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.refresh_secret)
    }
}

fn sign(
    user_id: &str,
    email: &str,
    ttl: Duration,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}
