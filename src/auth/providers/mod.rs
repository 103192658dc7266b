// src/auth/providers/mod.rs
//! OAuth provider adapters
//!
//! One implementation per provider behind a common capability trait, selected
//! by a string key at a single lookup point. Adapters only make outbound HTTP
//! calls; they never touch persistence. Provider error bodies are logged
//! internally and never forwarded to the browser.

pub mod github;
pub mod google;

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::AuthError;
use super::models::OAuthProfile;
use crate::common::config::AuthConfig;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

/// Capability interface implemented by each OAuth provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Stable key for this provider (`github`, `google`).
    fn name(&self) -> &'static str;

    /// True iff client id, secret and callback URL are all present.
    fn is_configured(&self) -> bool;

    /// Build the provider's authorize URL embedding the CSRF `state` nonce
    /// and the minimal scope needed for profile + verified email.
    fn auth_url(&self, state: &str) -> String;

    /// Exchange the authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError>;

    /// Fetch the verified profile for the given provider access token.
    async fn fetch_user_info(&self, access_token: &str) -> Result<OAuthProfile, AuthError>;
}

/// Registry of configured providers, keyed by name.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<HashMap<&'static str, Arc<dyn OAuthProvider>>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &AuthConfig, http: &Client) -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn OAuthProvider>> = HashMap::new();

        if let Some(creds) = &config.github {
            providers.insert(
                "github",
                Arc::new(GitHubProvider::new(creds.clone(), http.clone())),
            );
        }
        if let Some(creds) = &config.google {
            providers.insert(
                "google",
                Arc::new(GoogleProvider::new(creds.clone(), http.clone())),
            );
        }

        Self {
            providers: Arc::new(providers),
        }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            providers: Arc::new(HashMap::new()),
        }
    }

    /// Look up a configured provider by key. Unknown keys and registered but
    /// incompletely configured providers both return `None`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers
            .get(name)
            .filter(|p| p.is_configured())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ProviderCredentials;

    fn test_creds() -> ProviderCredentials {
        ProviderCredentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            callback_url: "http://localhost:8080/auth/oauth/callback".to_string(),
        }
    }

    #[test]
    fn test_registry_lookup() {
        let config = AuthConfig {
            access_secret: "a".to_string(),
            refresh_secret: "r".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            github: Some(test_creds()),
            google: None,
            secure_cookies: false,
        };
        let registry = ProviderRegistry::from_config(&config, &Client::new());

        assert!(registry.get("github").is_some());
        assert!(registry.get("google").is_none());
        assert!(registry.get("gitlab").is_none());
    }

    #[test]
    fn test_unconfigured_provider_is_hidden() {
        let mut creds = test_creds();
        creds.client_secret = String::new();

        let provider = GitHubProvider::new(creds, Client::new());
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_auth_urls_embed_state_and_scope() {
        let github = GitHubProvider::new(test_creds(), Client::new());
        let url = github.auth_url("NONCE123");
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("state=NONCE123"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("user%3Aemail"));

        let google = GoogleProvider::new(test_creds(), Client::new());
        let url = google.auth_url("NONCE123");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("state=NONCE123"));
        assert!(url.contains("response_type=code"));
    }
}
