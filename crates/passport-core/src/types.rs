//! Core types for passport-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role id given to self-registered users.
pub const CUSTOMER_ROLE_ID: i64 = 1;
/// Role id given to users registered through the admin flow.
pub const ADMIN_ROLE_ID: i64 = 2;

/// Identity payload embedded in access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: String,
    pub role_id: i64,
}

/// Stored user account, including the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: i64,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role_id: i64,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            username: record.username,
            role_id: record.role_id,
        }
    }
}

/// Token pair handed back to the client, keyed by the session (oauth) id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful authentication or registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passport {
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<UserToken>,
}

/// Sign-in request
#[derive(Debug, Clone, Deserialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
}

/// Sign-up request
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// User row as handed to the store, with the password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Persisted session (oauth) row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Session row to insert on sign-in
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// In-place rotation of an existing session row
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Entry of the role table; `id` is a single-bit mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub title: String,
}

impl Role {
    /// Roles seeded into a fresh store
    pub fn defaults() -> Vec<Role> {
        vec![
            Role { id: CUSTOMER_ROLE_ID, title: "customer".to_string() },
            Role { id: ADMIN_ROLE_ID, title: "admin".to_string() },
        ]
    }
}

/// Create a new opaque record id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
