//! In-memory credential store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::CredentialStore;
use crate::types::{
    new_id, NewSession, NewUser, Role, SessionRecord, SessionUpdate, UserProfile, UserRecord,
    ADMIN_ROLE_ID, CUSTOMER_ROLE_ID,
};
use crate::{Error, Result};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, SessionRecord>,
    roles: Vec<Role>,
}

/// Credential store kept in process memory.
///
/// All tables sit behind one lock, so every trait method is atomic.
#[derive(Clone)]
pub struct InMemoryCredentialStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryCredentialStore {
    /// Empty store seeded with the default roles
    pub fn new() -> Self {
        Self::with_roles(Role::defaults())
    }

    pub fn with_roles(mut roles: Vec<Role>) -> Self {
        roles.sort_by_key(|r| r.id);
        Self {
            tables: Arc::new(RwLock::new(Tables { roles, ..Default::default() })),
        }
    }

    /// Insert a fully formed user record, bypassing duplicate checks
    pub fn insert_user_record(&self, record: UserRecord) {
        self.tables.write().users.insert(record.id.clone(), record);
    }

    /// Change a user's role, as an administrator would
    pub fn set_role(&self, user_id: &str, role_id: i64) -> Result<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::not_found("user"))?;
        user.role_id = role_id;
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.tables.read().sessions.len()
    }

    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }

    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.tables.read().sessions.get(session_id).cloned()
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser, is_admin: bool) -> Result<UserProfile> {
        let mut tables = self.tables.write();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(Error::UsernameTaken);
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Error::EmailTaken);
        }

        let record = UserRecord {
            id: new_id(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role_id: if is_admin { ADMIN_ROLE_ID } else { CUSTOMER_ROLE_ID },
        };
        tables.users.insert(record.id.clone(), record.clone());
        Ok(record.into())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.tables.read().users.get(user_id).cloned().map(UserProfile::from))
    }

    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord> {
        let record = SessionRecord {
            id: new_id(),
            user_id: session.user_id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        };
        self.tables
            .write()
            .sessions
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<SessionRecord>> {
        Ok(self
            .tables
            .read()
            .sessions
            .values()
            .find(|s| s.refresh_token == refresh_token)
            .cloned())
    }

    async fn find_access_token(&self, user_id: &str, access_token: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .sessions
            .values()
            .any(|s| s.user_id == user_id && s.access_token == access_token))
    }

    async fn update_session(&self, update: SessionUpdate) -> Result<()> {
        let mut tables = self.tables.write();
        let session = tables
            .sessions
            .get_mut(&update.id)
            .ok_or_else(|| Error::not_found("session"))?;
        session.access_token = update.access_token;
        session.refresh_token = update.refresh_token;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.tables
            .write()
            .sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("session"))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.tables.read().roles.clone())
    }
}
