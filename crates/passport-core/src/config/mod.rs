//! Configuration for passport-core

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::jwt::JwtConfig;
use crate::{Error, Result};

/// Environment variable prefix, e.g. `PASSPORT_JWT__SECRET_KEY`
pub const ENV_PREFIX: &str = "PASSPORT";

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PassportConfig {
    pub database_url: String,
    pub api_bind_address: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

/// Password policy and argon2 cost parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special: bool,
    pub argon2_memory_cost: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
}

/// HMAC key material; never printed.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(**redacted**)")
    }
}

impl PassportConfig {
    /// Load configuration from environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from an optional TOML file, then the environment.
    ///
    /// Later sources override earlier ones; anything left unset keeps its
    /// default. The result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: PassportConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(Error::Config("database_url is not configured".to_string()));
        }
        self.jwt.validate()?;
        self.password.validate()
    }
}

impl PasswordConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(Error::Config(format!(
                "password length bounds {}..{} are invalid",
                self.min_length, self.max_length
            )));
        }
        if self.argon2_time_cost == 0 || self.argon2_parallelism == 0 {
            return Err(Error::Config("argon2 costs must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for PassportConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://passport.db?mode=rwc".to_string(),
            api_bind_address: "127.0.0.1:3000".to_string(),
            jwt: JwtConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: false,
            require_lowercase: true,
            require_numbers: true,
            require_special: false,
            argon2_memory_cost: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_secret_key_is_redacted() {
        let key = SecretKey::new("super-secret-value");
        let printed = format!("{:?}", key);
        assert!(!printed.contains("super-secret-value"));
    }

    #[test]
    fn test_default_config_requires_keys() {
        // Keys have no default; an unconfigured process must refuse to start.
        let config = PassportConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passport.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
database_url = "sqlite::memory:"

[jwt]
secret_key = "primary-secret-for-tests"
admin_key = "admin-secret-for-tests"
api_key = "api-secret-for-tests"
access_expires_at = 120

[password]
min_length = 6
"#
        )
        .unwrap();

        let config = PassportConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.jwt.access_expires_at, 120);
        assert_eq!(config.jwt.refresh_expires_at, JwtConfig::default().refresh_expires_at);
        assert_eq!(config.jwt.secret_key, SecretKey::new("primary-secret-for-tests"));
        assert_eq!(config.password.min_length, 6);
        assert_eq!(config.password.max_length, 128);
    }

    #[test]
    fn test_load_rejects_shared_admin_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passport.toml");
        std::fs::write(
            &path,
            "[jwt]\nsecret_key = \"same\"\nadmin_key = \"same\"\napi_key = \"other\"\n",
        )
        .unwrap();

        assert!(matches!(PassportConfig::load(Some(&path)), Err(Error::Config(_))));
    }
}
