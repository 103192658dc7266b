//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - BFF OAuth login flow (GitHub, Google) with CSRF state defense
//! - Access/refresh JWT pair generation and verification
//! - Identity resolution and multi-provider account linking
//! - Session gate middleware with transparent refresh
//! - AuthedUser/MaybeUser/OwnerUser extractors for route policies

pub mod cookies;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod routes;
pub mod tokens;

pub use extractors::{AuthedUser, MaybeUser, OwnerUser};
pub use gate::session_gate;
pub use models::User;
pub use routes::auth_routes;
