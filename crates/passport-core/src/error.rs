//! Error types for passport-core

use thiserror::Error;

/// Coarse classification used by callers to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input; the client should not retry as-is.
    Validation,
    /// Bad credentials or a bad, expired or forged token.
    Authentication,
    /// Valid identity without a matching role.
    Authorization,
    /// Duplicate username or email.
    Conflict,
    /// Session or profile missing.
    NotFound,
    /// Store, signing or configuration failure.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown token type: {0}")]
    UnknownTokenType(String),

    #[error("Role value is not a valid mask: {0}")]
    InvalidRole(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token format is invalid")]
    MalformedToken,

    #[error("Token had expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("No permission to access")]
    PermissionDenied,

    #[error("Username has been used")]
    UsernameTaken,

    #[error("Email has been used")]
    EmailTaken,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Role set has {0} entries, at most {max} are supported", max = crate::authz::MAX_ROLES)]
    RoleSetTooLarge(usize),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::UnknownTokenType(_) | Self::InvalidRole(_) => {
                ErrorKind::Validation
            }
            Self::InvalidCredentials
            | Self::MalformedToken
            | Self::TokenExpired
            | Self::InvalidToken(_) => ErrorKind::Authentication,
            Self::PermissionDenied => ErrorKind::Authorization,
            Self::UsernameTaken | Self::EmailTaken => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Signing(_)
            | Self::PasswordHash(_)
            | Self::Database(_)
            | Self::Store(_)
            | Self::Config(_)
            | Self::RoleSetTooLarge(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::InvalidCredentials.kind(), ErrorKind::Authentication);
        assert_eq!(Error::TokenExpired.kind(), ErrorKind::Authentication);
        assert_eq!(Error::PermissionDenied.kind(), ErrorKind::Authorization);
        assert_eq!(Error::EmailTaken.kind(), ErrorKind::Conflict);
        assert_eq!(Error::not_found("session").kind(), ErrorKind::NotFound);
        assert_eq!(Error::InvalidRole("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::RoleSetTooLarge(70).kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_permission_denied_message_is_generic() {
        assert_eq!(Error::PermissionDenied.to_string(), "No permission to access");
    }
}
