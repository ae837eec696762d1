//! SQLite-backed credential store

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use super::CredentialStore;
use crate::types::{
    new_id, NewSession, NewUser, Role, SessionRecord, SessionUpdate, UserProfile, UserRecord,
    ADMIN_ROLE_ID, CUSTOMER_ROLE_ID,
};
use crate::{Error, Result};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        role_id INTEGER NOT NULL REFERENCES roles(id),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS oauth (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        access_token TEXT NOT NULL,
        refresh_token TEXT NOT NULL UNIQUE,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_oauth_user_access ON oauth(user_id, access_token)",
];

/// Credential store on a SQLite database
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Connect, create the schema if needed and seed the default roles
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep one
        // connection alive for the lifetime of the pool.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        store.seed_roles(&Role::defaults()).await?;
        info!("credential store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert roles that are not present yet
    pub async fn seed_roles(&self, roles: &[Role]) -> Result<()> {
        for role in roles {
            sqlx::query("INSERT OR IGNORE INTO roles (id, title) VALUES (?1, ?2)")
                .bind(role.id)
                .bind(&role.title)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Change a user's role
    pub async fn set_role(&self, user_id: &str, role_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE users SET role_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(role_id)
            .bind(Utc::now().timestamp())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("user"));
        }
        Ok(())
    }

    pub async fn session_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM oauth")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
        role_id: row.try_get("role_id")?,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord> {
    let expires_at: i64 = row.try_get("expires_at")?;
    Ok(SessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: DateTime::from_timestamp(expires_at, 0)
            .ok_or_else(|| Error::Store(format!("session expiry {} out of range", expires_at)))?,
    })
}

/// Map unique-constraint failures that slip past the pre-insert check
fn map_insert_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let message = db.message();
            if message.contains("users.username") {
                return Error::UsernameTaken;
            }
            if message.contains("users.email") {
                return Error::EmailTaken;
            }
        }
    }
    Error::Database(e)
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, username, password, role_id FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: NewUser, is_admin: bool) -> Result<UserProfile> {
        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query(
            "SELECT username FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
        )
        .bind(&user.username)
        .bind(&user.email)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = taken {
            let username: String = row.try_get("username")?;
            return Err(if username == user.username {
                Error::UsernameTaken
            } else {
                Error::EmailTaken
            });
        }

        let id = new_id();
        let role_id = if is_admin { ADMIN_ROLE_ID } else { CUSTOMER_ROLE_ID };
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO users (id, email, username, password, role_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(role_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        tx.commit().await?;
        debug!(user_id = %id, "user inserted");

        Ok(UserProfile {
            id,
            email: user.email,
            username: user.username,
            role_id,
        })
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT id, email, username, password, role_id FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?.map(UserProfile::from))
    }

    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord> {
        let id = new_id();
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO oauth
                (id, user_id, access_token, refresh_token, expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(&id)
        .bind(&session.user_id)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.expires_at.timestamp())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(SessionRecord {
            id,
            user_id: session.user_id,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        })
    }

    async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, access_token, refresh_token, expires_at
             FROM oauth WHERE refresh_token = ?1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn find_access_token(&self, user_id: &str, access_token: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM oauth WHERE user_id = ?1 AND access_token = ?2 LIMIT 1",
        )
        .bind(user_id)
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn update_session(&self, update: SessionUpdate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE oauth SET access_token = ?1, refresh_token = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&update.access_token)
        .bind(&update.refresh_token)
        .bind(Utc::now().timestamp())
        .bind(&update.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("session"));
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM oauth WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("session"));
        }
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT id, title FROM roles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Role> {
                Ok(Role {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                })
            })
            .collect()
    }
}
