//! Session manager
//!
//! Ties the token codec to the credential store. A session moves through
//! `none -> active (sign-in) -> active' (refresh) -> absent (sign-out)`;
//! refreshing an absent session fails with `NotFound`. The manager keeps no
//! mutable state of its own, so it can be shared freely across requests.

pub mod password;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use tracing::{debug, error, info, warn};

use crate::config::PasswordConfig;
use crate::jwt::{TokenCodec, TokenKind, TrustDomain};
use crate::store::CredentialStore;
use crate::types::{
    NewSession, NewUser, Passport, Registration, SessionUpdate, UserClaims, UserCredential,
    UserProfile, UserToken,
};
use crate::validation::validate_registration;
use crate::{Error, ErrorKind, Result};

pub use password::Argon2Hasher;

/// Sign-in, refresh, sign-out and registration
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    hasher: Argon2Hasher,
    password_policy: PasswordConfig,
    /// Verified against when the email is unknown, so both rejection paths
    /// cost one argon2 run.
    decoy_hash: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        password_policy: PasswordConfig,
    ) -> Result<Self> {
        let hasher = Argon2Hasher::new(&password_policy)?;
        let decoy = Alphanumeric.sample_string(&mut rand::thread_rng(), 32);
        let decoy_hash = hasher.hash(&decoy)?;

        Ok(Self {
            store,
            codec,
            hasher,
            password_policy,
            decoy_hash,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::PasswordHash(format!("hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| Error::PasswordHash(format!("verification task failed: {}", e)))?
    }

    /// Authenticate by email and password and open a new session.
    ///
    /// Unknown email and wrong password both return
    /// [`Error::InvalidCredentials`]; only the logs tell them apart.
    pub async fn sign_in(&self, credential: &UserCredential) -> Result<Passport> {
        let user = match self.store.find_user_by_email(&credential.email).await? {
            Some(user) => user,
            None => {
                let _ = self.verify_password(&credential.password, &self.decoy_hash).await;
                warn!("sign-in rejected: no account for the given email");
                return Err(Error::InvalidCredentials);
            }
        };

        if !self.verify_password(&credential.password, &user.password_hash).await? {
            warn!(user_id = %user.id, "sign-in rejected: password mismatch");
            return Err(Error::InvalidCredentials);
        }

        let claims = UserClaims {
            id: user.id.clone(),
            role_id: user.role_id,
        };
        let access = self.codec.issue(TokenKind::Access, Some(&claims))?;
        let refresh = self.codec.issue(TokenKind::Refresh, Some(&claims))?;

        let session = self
            .store
            .insert_session(NewSession {
                user_id: user.id.clone(),
                access_token: self.codec.sign(&access)?,
                refresh_token: self.codec.sign(&refresh)?,
                expires_at: to_datetime(refresh.expires_at())?,
            })
            .await?;

        info!(user_id = %user.id, session_id = %session.id, "signed in");
        Ok(Passport {
            user: user.into(),
            token: Some(UserToken {
                id: session.id,
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            }),
        })
    }

    /// Rotate a session's tokens.
    ///
    /// The new refresh token keeps the old one's absolute expiry, and the
    /// session row is updated in place so the previous refresh token stops
    /// resolving to a session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Passport> {
        let parsed = self.codec.parse(refresh_token, TrustDomain::Primary)?;
        parsed.expect_kind(TokenKind::Refresh)?;
        let old_claims = parsed.user_claims()?;

        let session = self
            .store
            .find_session_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %old_claims.id, "refresh token is not bound to a live session");
                Error::not_found("session")
            })?;
        if session.user_id != old_claims.id {
            warn!(session_id = %session.id, "refresh token subject does not own the session");
            return Err(Error::InvalidToken("token does not match session".to_string()));
        }

        // Role may have changed since the token was issued.
        let profile = self
            .store
            .get_profile(&session.user_id)
            .await?
            .ok_or_else(|| Error::not_found("user profile"))?;
        let claims = UserClaims {
            id: profile.id.clone(),
            role_id: profile.role_id,
        };

        let access_token = self.codec.issue_signed(TokenKind::Access, Some(&claims))?;
        let refresh_token = self.codec.repeat_token(&claims, parsed.expires_at())?;

        self.store
            .update_session(SessionUpdate {
                id: session.id.clone(),
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
            })
            .await?;

        info!(user_id = %profile.id, session_id = %session.id, "session refreshed");
        Ok(Passport {
            user: profile,
            token: Some(UserToken {
                id: session.id,
                access_token,
                refresh_token,
            }),
        })
    }

    /// Delete a session; an unknown id is `NotFound`
    pub async fn sign_out(&self, session_id: &str) -> Result<()> {
        self.store.delete_session(session_id).await?;
        info!(session_id, "signed out");
        Ok(())
    }

    pub async fn register_customer(&self, registration: &Registration) -> Result<Passport> {
        self.register(registration, false).await
    }

    pub async fn register_admin(&self, registration: &Registration) -> Result<Passport> {
        self.register(registration, true).await
    }

    async fn register(&self, registration: &Registration, is_admin: bool) -> Result<Passport> {
        validate_registration(registration, &self.password_policy)?;

        let password_hash = self.hash_password(&registration.password).await?;
        let user = NewUser {
            email: registration.email.clone(),
            username: registration.username.clone(),
            password_hash,
        };

        let profile = self.store.insert_user(user, is_admin).await.map_err(|e| {
            if e.kind() == ErrorKind::Conflict {
                debug!("registration rejected: {}", e);
            } else {
                error!("registration failed: {}", e);
            }
            e
        })?;

        info!(user_id = %profile.id, is_admin, "user registered");
        Ok(Passport {
            user: profile,
            token: None,
        })
    }

    /// Mint a short-lived admin token
    pub fn issue_admin_token(&self) -> Result<String> {
        self.codec.issue_signed(TokenKind::Admin, None)
    }

    /// Verify an access token and require that it still belongs to a live
    /// session, so sign-out and rotation revoke it before it expires.
    pub async fn authenticate(&self, access_token: &str) -> Result<UserClaims> {
        let parsed = self.codec.parse(access_token, TrustDomain::Primary)?;
        parsed.expect_kind(TokenKind::Access)?;
        let claims = parsed.user_claims()?.clone();

        if !self.store.find_access_token(&claims.id, access_token).await? {
            debug!(user_id = %claims.id, "access token has no live session");
            return Err(Error::InvalidToken("session is no longer active".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_admin_token(&self, admin_token: &str) -> Result<()> {
        self.codec
            .parse(admin_token, TrustDomain::Admin)?
            .expect_kind(TokenKind::Admin)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user profile"))
    }
}

fn to_datetime(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| Error::Config(format!("token expiry {} is out of range", timestamp)))
}
