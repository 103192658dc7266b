//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User role for authorization checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Member => "MEMBER",
        }
    }
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: Option<String>,
}

/// Identity link row associating one OAuth provider account with a local user
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct IdentityLink {
    pub provider: String,
    pub provider_id: String,
    pub user_id: String,
}

/// Verified profile returned by a provider adapter after code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: String,
    pub provider_id: String,
    pub email: String,
    pub username: String,
}

/// JWT claims structure, shared by access and refresh tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// A freshly signed access/refresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity attached to a request by the session gate.
///
/// `role` is `None` when the gate fell back to the token's own claims because
/// the live user lookup failed transiently; the claims carry no role, so
/// owner-only routes reject until the store recovers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: Option<Role>,
}

impl CurrentUser {
    pub fn from_record(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: Some(user.role),
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            role: None,
        }
    }
}
