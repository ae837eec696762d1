//! # Passport-Core
//!
//! Session and identity layer for multi-role applications.
//!
//! This crate provides:
//! - Signed bearer tokens for four trust domains (access, refresh, admin, api-key)
//! - Sessions persisted per sign-in, so tokens can be revoked
//! - Refresh-token rotation that never extends the session lifetime
//! - Role-mask authorization against a stored role table
//! - Password authentication with Argon2
//! - A REST API exposing the above
//!
//! ## Architecture
//!
//! [`SessionManager`] and [`AuthorizationGate`] hold no mutable state; all
//! consistency comes from the [`CredentialStore`] they are given.

pub mod error;
pub mod types;
pub mod auth;
pub mod authz;
pub mod store;
pub mod jwt;
pub mod api;
pub mod config;
pub mod validation;

use std::sync::Arc;

pub use error::{Error, ErrorKind, Result};
pub use types::{
    Passport, Registration, Role, SessionRecord, UserClaims, UserCredential, UserProfile,
    UserRecord, UserToken, ADMIN_ROLE_ID, CUSTOMER_ROLE_ID,
};
pub use auth::SessionManager;
pub use authz::AuthorizationGate;
pub use store::{CredentialStore, InMemoryCredentialStore, SqliteCredentialStore};
pub use jwt::{JwtConfig, TokenCodec, TokenKind, TrustDomain};
pub use api::AppState;
pub use config::{PassportConfig, PasswordConfig, SecretKey};

/// Build the service state on top of an already opened store
pub fn with_store(config: &PassportConfig, store: Arc<dyn CredentialStore>) -> Result<AppState> {
    config.validate()?;

    let codec = Arc::new(TokenCodec::new(config.jwt.clone())?);
    let sessions = SessionManager::new(store.clone(), codec, config.password.clone())?;
    let gate = AuthorizationGate::new(store);

    Ok(AppState::new(sessions, gate))
}

/// Initialize the passport service on the configured SQLite database
pub async fn init(config: &PassportConfig) -> Result<AppState> {
    let store = SqliteCredentialStore::new(&config.database_url).await?;
    with_store(config, Arc::new(store))
}
