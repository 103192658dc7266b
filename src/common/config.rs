// src/common/config.rs
//! Process-wide authentication configuration
//!
//! All secrets and provider credentials are read from the environment exactly
//! once at startup and validated eagerly. Missing JWT secrets abort boot
//! rather than failing on the first request.

use anyhow::{bail, Context};
use std::env;
use tracing::{info, warn};

/// OAuth client credentials for a single provider.
///
/// A provider is only registered when all three fields are non-empty.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl ProviderCredentials {
    fn from_env(prefix: &str) -> Option<Self> {
        let client_id = env::var(format!("{prefix}_CLIENT_ID")).ok()?;
        let client_secret = env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
        let callback_url = env::var(format!("{prefix}_CALLBACK_URL")).ok()?;

        let creds = Self {
            client_id,
            client_secret,
            callback_url,
        };
        creds.is_complete().then_some(creds)
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.callback_url.is_empty()
    }
}

/// Authentication configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing short-lived access tokens.
    pub access_secret: String,
    /// Independent secret for signing long-lived refresh tokens.
    pub refresh_secret: String,
    /// Base URL of the frontend, target of all callback-phase redirects.
    pub frontend_url: String,
    pub github: Option<ProviderCredentials>,
    pub google: Option<ProviderCredentials>,
    /// Mark auth cookies `Secure` (always on in production).
    pub secure_cookies: bool,
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let access_secret =
            env::var("JWT_ACCESS_SECRET").context("JWT_ACCESS_SECRET must be set")?;
        let refresh_secret =
            env::var("JWT_REFRESH_SECRET").context("JWT_REFRESH_SECRET must be set")?;

        if access_secret.is_empty() || refresh_secret.is_empty() {
            bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be non-empty");
        }
        if access_secret == refresh_secret {
            warn!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET are identical; use independent secrets");
        }

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let github = ProviderCredentials::from_env("GITHUB");
        let google = ProviderCredentials::from_env("GOOGLE");

        if github.is_none() && google.is_none() {
            bail!("no OAuth provider configured: set GITHUB_* or GOOGLE_* credentials");
        }

        info!(
            github_enabled = github.is_some(),
            google_enabled = google.is_some(),
            "Loaded auth configuration"
        );

        let secure_cookies = env::var("ENVIRONMENT")
            .map(|e| e == "production")
            .unwrap_or(false)
            || env::var("SECURE_COOKIES").map(|v| v == "true").unwrap_or(false);

        Ok(Self {
            access_secret,
            refresh_secret,
            frontend_url,
            github,
            google,
            secure_cookies,
        })
    }
}
