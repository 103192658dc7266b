// src/auth/providers/google.rs
//! Google OAuth adapter
//!
//! Uses the v2 userinfo endpoint after the code exchange. Google reports
//! email verification inline on the profile, so no second call is needed;
//! an unverified or missing email is still a hard `NoVerifiedEmail` stop.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::OAuthProvider;
use crate::auth::error::AuthError;
use crate::auth::models::OAuthProfile;
use crate::common::config::ProviderCredentials;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPE: &str = "openid email profile";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    verified_email: Option<bool>,
    name: Option<String>,
}

pub struct GoogleProvider {
    creds: ProviderCredentials,
    http: Client,
}

impl GoogleProvider {
    pub fn new(creds: ProviderCredentials, http: Client) -> Self {
        Self { creds, http }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn is_configured(&self) -> bool {
        self.creds.is_complete()
    }

    fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.creds.client_id),
            urlencoding::encode(&self.creds.callback_url),
            urlencoding::encode(SCOPE),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.creds.client_id.as_str()),
            ("client_secret", self.creds.client_secret.as_str()),
            ("redirect_uri", self.creds.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = "google", "Exchanging authorization code for token");

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "google", error = %e, "Token exchange request failed");
                AuthError::ExchangeFailed("token endpoint unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(
                provider = "google",
                status = %status,
                error = %error_text,
                "Token exchange returned error status"
            );
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            error!(provider = "google", error = %e, "Failed to parse token response");
            AuthError::ExchangeFailed("malformed token response".to_string())
        })?;

        body.access_token.ok_or_else(|| {
            error!(provider = "google", "Token response missing access_token");
            AuthError::ExchangeFailed("token response missing access_token".to_string())
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let info: GoogleUserInfo = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "google", error = %e, "Userinfo request failed");
                AuthError::ExchangeFailed("userinfo endpoint unreachable".to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                error!(provider = "google", error = %e, "Userinfo request returned error status");
                AuthError::ExchangeFailed("userinfo fetch failed".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!(provider = "google", error = %e, "Failed to parse userinfo response");
                AuthError::ExchangeFailed("malformed userinfo response".to_string())
            })?;

        let email = match (info.email, info.verified_email) {
            (Some(email), Some(true)) => email,
            _ => return Err(AuthError::NoVerifiedEmail),
        };

        // Fall back to the email local part when Google omits the name
        let username = info
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(OAuthProfile {
            provider: "google".to_string(),
            provider_id: info.id,
            email,
            username,
        })
    }
}
