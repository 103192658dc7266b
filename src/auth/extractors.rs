//! Authentication extractors for Axum
//!
//! The session gate middleware has already verified credentials and attached
//! a [`CurrentUser`] to the request extensions; these extractors implement
//! the per-route policy on top of it: required, optional, and owner-only.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::models::{CurrentUser, Role};
use crate::common::ApiError;

/// Authenticated user, required mode: rejects with 401 when the session gate
/// attached no identity.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub role: Option<Role>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(user) => Ok(AuthedUser {
                id: user.id.clone(),
                email: user.email.clone(),
                role: user.role,
            }),
            None => Err(ApiError::Unauthorized("authentication required".into())),
        }
    }
}

/// Optional mode: `None` when unauthenticated, never rejects.
#[derive(Debug)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// Owner-only composition on top of required auth: authenticate first, then
/// require `role == OWNER`, else 403.
///
/// A missing role (freshness-check fallback) is treated as not-owner; the
/// token claims alone cannot prove ownership.
#[derive(Debug)]
pub struct OwnerUser {
    pub id: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for OwnerUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authed = AuthedUser::from_request_parts(parts, state).await?;

        if authed.role != Some(Role::Owner) {
            warn!(user_id = %authed.id, "Rejected non-owner access to owner-only route");
            return Err(ApiError::Forbidden("owner role required".into()));
        }

        Ok(OwnerUser {
            id: authed.id,
            email: authed.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(user: Option<CurrentUser>) -> Parts {
        let mut request = Request::builder().uri("/api/me").body(()).unwrap();
        if let Some(user) = user {
            request.extensions_mut().insert(user);
        }
        request.into_parts().0
    }

    fn member() -> CurrentUser {
        CurrentUser {
            id: "U_TESTUSER".to_string(),
            email: "alice@example.com".to_string(),
            role: Some(Role::Member),
        }
    }

    #[tokio::test]
    async fn test_authed_user_requires_identity() {
        let mut parts = parts_with(None);
        let result = AuthedUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let mut parts = parts_with(Some(member()));
        let authed = AuthedUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(authed.id, "U_TESTUSER");
    }

    #[tokio::test]
    async fn test_maybe_user_never_rejects() {
        let mut parts = parts_with(None);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());

        let mut parts = parts_with(Some(member()));
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.unwrap().id, "U_TESTUSER");
    }

    #[tokio::test]
    async fn test_owner_user_composition() {
        // Unauthenticated: 401, not 403
        let mut parts = parts_with(None);
        assert!(matches!(
            OwnerUser::from_request_parts(&mut parts, &()).await,
            Err(ApiError::Unauthorized(_))
        ));

        // Member: 403
        let mut parts = parts_with(Some(member()));
        assert!(matches!(
            OwnerUser::from_request_parts(&mut parts, &()).await,
            Err(ApiError::Forbidden(_))
        ));

        // Stale-claims fallback (no role): 403
        let mut parts = parts_with(Some(CurrentUser { role: None, ..member() }));
        assert!(matches!(
            OwnerUser::from_request_parts(&mut parts, &()).await,
            Err(ApiError::Forbidden(_))
        ));

        // Owner: allowed
        let mut parts = parts_with(Some(CurrentUser {
            role: Some(Role::Owner),
            ..member()
        }));
        let owner = OwnerUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(owner.id, "U_TESTUSER");
    }
}
