// src/auth/resolver.rs
//! Identity resolution: provider profile -> local user account
//!
//! Lookup order is link, then email, then create. The email branch performs
//! account linking so one user can sign in with multiple providers; the
//! create branch inserts the user and its link in a single transaction.
//! Every branch checks `is_active` before the caller can issue tokens.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::models::{IdentityLink, OAuthProfile, User};
use crate::common::{generate_user_id, safe_email_log};

#[derive(Clone)]
pub struct IdentityResolver {
    db: SqlitePool,
}

impl IdentityResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Map a verified provider profile to a local user, creating or linking
    /// accounts as needed.
    pub async fn resolve(&self, profile: &OAuthProfile) -> Result<User, AuthError> {
        // 1. Existing link for this (provider, provider_id)
        if let Some(user) = self.find_by_link(&profile.provider, &profile.provider_id).await? {
            debug!(
                user_id = %user.id,
                provider = %profile.provider,
                "Resolved existing identity link"
            );
            return active_or_err(user);
        }

        // 2. Existing user with the same email: attach a new link
        if let Some(user) = self.find_by_email(&profile.email).await? {
            self.insert_link(&profile.provider, &profile.provider_id, &user.id)
                .await?;
            info!(
                user_id = %user.id,
                provider = %profile.provider,
                email = %safe_email_log(&user.email),
                "Linked new provider to existing account"
            );
            return active_or_err(user);
        }

        // 3. First login: create user + link atomically
        match self.create_user_with_link(profile).await {
            Ok(user) => {
                info!(
                    user_id = %user.id,
                    provider = %profile.provider,
                    email = %safe_email_log(&user.email),
                    "Created new user account via OAuth"
                );
                active_or_err(user)
            }
            Err(e) if is_unique_violation(&e) => {
                // Concurrent first login for the same email: the other
                // callback won the insert, so join its account instead of
                // propagating the conflict.
                warn!(
                    provider = %profile.provider,
                    email = %safe_email_log(&profile.email),
                    "User creation raced a concurrent login, re-reading winner"
                );
                let user = self
                    .find_by_email(&profile.email)
                    .await?
                    .ok_or(AuthError::Database(sqlx::Error::RowNotFound))?;
                self.insert_link(&profile.provider, &profile.provider_id, &user.id)
                    .await?;
                active_or_err(user)
            }
            Err(e) => Err(AuthError::Database(e)),
        }
    }

    /// Live user lookup by id, used by the session gate's freshness check.
    pub async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
    }

    /// All provider links attached to an account.
    pub async fn links_for(&self, user_id: &str) -> Result<Vec<IdentityLink>, sqlx::Error> {
        sqlx::query_as::<_, IdentityLink>(
            "SELECT provider, provider_id, user_id FROM identities WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
    }

    async fn find_by_link(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN identities i ON i.user_id = u.id
            WHERE i.provider = ? AND i.provider_id = ?
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.db)
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await
    }

    async fn insert_link(
        &self,
        provider: &str,
        provider_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        // OR IGNORE tolerates a replayed callback racing the same link row
        sqlx::query(
            "INSERT OR IGNORE INTO identities (provider, provider_id, user_id) VALUES (?, ?, ?)",
        )
        .bind(provider)
        .bind(provider_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn create_user_with_link(&self, profile: &OAuthProfile) -> Result<User, sqlx::Error> {
        let id = generate_user_id();

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, email, username, role, is_active) VALUES (?, ?, ?, 'MEMBER', 1)",
        )
        .bind(&id)
        .bind(&profile.email)
        .bind(&profile.username)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO identities (provider, provider_id, user_id) VALUES (?, ?, ?)")
            .bind(&profile.provider)
            .bind(&profile.provider_id)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }
}

fn active_or_err(user: User) -> Result<User, AuthError> {
    if !user.is_active {
        warn!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "Rejected login for deactivated account"
        );
        return Err(AuthError::InactiveUser);
    }
    Ok(user)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(d) if d.is_unique_violation())
}
