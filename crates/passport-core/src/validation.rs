//! Input validation for registration requests

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

use crate::config::PasswordConfig;
use crate::types::Registration;
use crate::{Error, Result};

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]{3,32}$").unwrap());
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Registration fields checked by derive rules; the password is checked
/// separately against the configured policy.
#[derive(Debug, Validate)]
struct RegistrationInput {
    #[validate(length(max = 255), custom(function = "validate_email"))]
    email: String,

    #[validate(custom(function = "validate_username"))]
    username: String,
}

/// Validate username format
pub fn validate_username(username: &str) -> std::result::Result<(), ValidationError> {
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::new("invalid_username_format"));
    }
    Ok(())
}

/// Validate email format
pub fn validate_email(email: &str) -> std::result::Result<(), ValidationError> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::new("invalid_email_format"));
    }

    if email.contains('<') || email.contains('>') || email.contains('"') || email.contains('\'') {
        return Err(ValidationError::new("email_contains_dangerous_chars"));
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password must be at least {0} characters")]
    TooShort(usize),

    #[error("Password must not exceed {0} characters")]
    TooLong(usize),

    #[error("Password must contain an uppercase letter")]
    MissingUppercase,

    #[error("Password must contain a lowercase letter")]
    MissingLowercase,

    #[error("Password must contain a number")]
    MissingNumber,

    #[error("Password must contain a special character")]
    MissingSpecial,

    #[error("Password must not contain your username")]
    ContainsUsername,
}

/// Password policy check driven by [`PasswordConfig`]
pub struct PasswordValidator<'a> {
    policy: &'a PasswordConfig,
}

impl<'a> PasswordValidator<'a> {
    pub fn new(policy: &'a PasswordConfig) -> Self {
        Self { policy }
    }

    pub fn validate(
        &self,
        password: &str,
        username: &str,
    ) -> std::result::Result<(), PasswordError> {
        let length = password.chars().count();
        if length < self.policy.min_length {
            return Err(PasswordError::TooShort(self.policy.min_length));
        }
        if length > self.policy.max_length {
            return Err(PasswordError::TooLong(self.policy.max_length));
        }

        if self.policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(PasswordError::MissingUppercase);
        }
        if self.policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(PasswordError::MissingLowercase);
        }
        if self.policy.require_numbers && !password.chars().any(|c| c.is_numeric()) {
            return Err(PasswordError::MissingNumber);
        }
        if self.policy.require_special && password.chars().all(|c| c.is_alphanumeric()) {
            return Err(PasswordError::MissingSpecial);
        }

        if !username.is_empty() && password.to_lowercase().contains(&username.to_lowercase()) {
            return Err(PasswordError::ContainsUsername);
        }

        Ok(())
    }
}

/// Check a sign-up request before anything is hashed or stored
pub fn validate_registration(registration: &Registration, policy: &PasswordConfig) -> Result<()> {
    let input = RegistrationInput {
        email: registration.email.clone(),
        username: registration.username.clone(),
    };
    input
        .validate()
        .map_err(|errors| Error::Validation(errors.to_string()))?;

    PasswordValidator::new(policy)
        .validate(&registration.password, &registration.username)
        .map_err(|e| Error::Validation(e.to_string()))
}
