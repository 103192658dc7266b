// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;

use crate::auth::providers::ProviderRegistry;
use crate::auth::resolver::IdentityResolver;
use crate::auth::tokens::TokenService;
use crate::common::config::AuthConfig;

/// Application state containing the database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub config: AuthConfig,
    pub providers: ProviderRegistry,
    pub tokens: TokenService,
    pub resolver: IdentityResolver,
}
