//! Argon2id password hashing

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::rngs::OsRng;

use crate::config::PasswordConfig;
use crate::{Error, Result};

/// Salted, adaptive-cost password hasher
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| Error::Config(format!("Invalid argon2 parameters: {}", e)))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash with a fresh random salt into a PHC string
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::PasswordHash(e.to_string()))
    }

    /// Check `password` against a stored PHC string.
    ///
    /// The digest comparison is constant-time. Returns `Ok(false)` on a
    /// mismatch and an error only when the stored hash is unreadable.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| Error::PasswordHash(format!("stored hash is invalid: {}", e)))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::PasswordHash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(&PasswordConfig {
            argon2_memory_cost: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash).unwrap());
        assert!(!hasher.verify("secret2", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        assert_ne!(hasher.hash("secret1").unwrap(), hasher.hash("secret1").unwrap());
    }

    #[test]
    fn test_unreadable_hash_is_an_error() {
        assert!(matches!(hasher().verify("secret1", "plaintext"), Err(Error::PasswordHash(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig { argon2_memory_cost: 1, ..Default::default() };
        assert!(matches!(Argon2Hasher::new(&config), Err(Error::Config(_))));
    }
}
