//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use passport_core::auth::Argon2Hasher;
use passport_core::{
    CredentialStore, InMemoryCredentialStore, JwtConfig, PassportConfig, PasswordConfig,
    SecretKey, SessionManager, TokenCodec, UserRecord,
};

/// Configuration with distinct keys and cheap argon2 parameters
pub fn test_config() -> PassportConfig {
    PassportConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt: JwtConfig {
            secret_key: SecretKey::new("test-access-signing-key-0123456789abcdef"),
            admin_key: SecretKey::new("test-admin-signing-key-0123456789abcdef"),
            api_key: SecretKey::new("test-api-key-signing-key-0123456789abcdef"),
            ..Default::default()
        },
        password: PasswordConfig {
            argon2_memory_cost: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn session_manager(store: &InMemoryCredentialStore) -> SessionManager {
    session_manager_on(Arc::new(store.clone()))
}

pub fn session_manager_on(store: Arc<dyn CredentialStore>) -> SessionManager {
    let config = test_config();
    let codec = Arc::new(TokenCodec::new(config.jwt).unwrap());
    SessionManager::new(store, codec, config.password).unwrap()
}

/// Seed a user whose password hash was produced outside the manager
pub fn seed_user(
    store: &InMemoryCredentialStore,
    email: &str,
    password: &str,
    role_id: i64,
) -> String {
    let hasher = Argon2Hasher::new(&test_config().password).unwrap();
    let id = uuid::Uuid::new_v4().to_string();
    store.insert_user_record(UserRecord {
        id: id.clone(),
        email: email.to_string(),
        username: email.split('@').next().unwrap().to_string(),
        password_hash: hasher.hash(password).unwrap(),
        role_id,
    });
    id
}
