//! Credential store: users, sessions and the role table
//!
//! The session manager and the authorization gate only talk to the
//! [`CredentialStore`] trait. Each method must be atomic on its own; no
//! multi-call transactions are assumed.

use async_trait::async_trait;

use crate::types::{
    NewSession, NewUser, Role, SessionRecord, SessionUpdate, UserProfile, UserRecord,
};
use crate::Result;

mod memory;
mod sqlite;

pub use memory::InMemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

/// Persistence contract consumed by the core
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Insert a user with the customer role, or the admin role when
    /// `is_admin`. Fails with `UsernameTaken` / `EmailTaken` on duplicates.
    async fn insert_user(&self, user: NewUser, is_admin: bool) -> Result<UserProfile>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord>;

    async fn find_session_by_refresh_token(&self, refresh_token: &str)
        -> Result<Option<SessionRecord>>;

    /// Whether `access_token` is the live access token of one of the
    /// user's sessions
    async fn find_access_token(&self, user_id: &str, access_token: &str) -> Result<bool>;

    /// Replace both tokens of an existing session; `NotFound` if the row is gone
    async fn update_session(&self, update: SessionUpdate) -> Result<()>;

    /// `NotFound` if no row has this id
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Role table ordered by id
    async fn list_roles(&self) -> Result<Vec<Role>>;
}
