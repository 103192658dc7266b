// src/auth/providers/github.rs
//! GitHub OAuth adapter
//!
//! GitHub does not expose a verified email on the profile endpoint, so the
//! adapter makes a second call to `/user/emails` and selects the primary
//! verified entry. GitHub also reports some exchange failures as HTTP 200
//! with an `error` field in the body, so the token response is inspected
//! beyond its status code.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::OAuthProvider;
use crate::auth::error::AuthError;
use crate::auth::models::OAuthProfile;
use crate::common::config::ProviderCredentials;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";
const SCOPE: &str = "read:user user:email";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub struct GitHubProvider {
    creds: ProviderCredentials,
    http: Client,
}

impl GitHubProvider {
    pub fn new(creds: ProviderCredentials, http: Client) -> Self {
        Self { creds, http }
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn is_configured(&self) -> bool {
        self.creds.is_complete()
    }

    fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.creds.client_id),
            urlencoding::encode(&self.creds.callback_url),
            urlencoding::encode(SCOPE),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("client_id", self.creds.client_id.as_str()),
            ("client_secret", self.creds.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.creds.callback_url.as_str()),
        ];

        debug!(provider = "github", "Exchanging authorization code for token");

        let response = self
            .http
            .post(TOKEN_URL)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "github", error = %e, "Token exchange request failed");
                AuthError::ExchangeFailed("token endpoint unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(provider = "github", status = %status, "Token exchange returned error status");
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            error!(provider = "github", error = %e, "Failed to parse token response");
            AuthError::ExchangeFailed("malformed token response".to_string())
        })?;

        // GitHub reports bad codes as 200 with an error payload
        if let Some(err) = body.error {
            error!(
                provider = "github",
                oauth_error = %err,
                description = %body.error_description.unwrap_or_default(),
                "Provider rejected authorization code"
            );
            return Err(AuthError::ExchangeFailed(format!(
                "provider error: {err}"
            )));
        }

        body.access_token.ok_or_else(|| {
            error!(provider = "github", "Token response missing access_token");
            AuthError::ExchangeFailed("token response missing access_token".to_string())
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let user: GitHubUser = self
            .http
            .get(USER_URL)
            .bearer_auth(access_token)
            .header("User-Agent", "portfolio-api")
            .send()
            .await
            .map_err(|e| {
                error!(provider = "github", error = %e, "Profile request failed");
                AuthError::ExchangeFailed("profile endpoint unreachable".to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(provider = "github", error = %e, "Profile request returned error status");
                AuthError::ExchangeFailed("profile fetch failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!(provider = "github", error = %e, "Failed to parse profile response");
                AuthError::ExchangeFailed("malformed profile response".to_string())
            })?;

        let emails: Vec<GitHubEmail> = self
            .http
            .get(EMAILS_URL)
            .bearer_auth(access_token)
            .header("User-Agent", "portfolio-api")
            .send()
            .await
            .map_err(|e| {
                error!(provider = "github", error = %e, "Email list request failed");
                AuthError::ExchangeFailed("email endpoint unreachable".to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(provider = "github", error = %e, "Email list request returned error status");
                AuthError::ExchangeFailed("email list fetch failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!(provider = "github", error = %e, "Failed to parse email list");
                AuthError::ExchangeFailed("malformed email list response".to_string())
            })?;

        // Email is the cross-provider identity key, so only a verified
        // primary address is acceptable. No silent fallback.
        let email = emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
            .ok_or(AuthError::NoVerifiedEmail)?;

        Ok(OAuthProfile {
            provider: "github".to_string(),
            provider_id: user.id.to_string(),
            email,
            username: user.login,
        })
    }
}
