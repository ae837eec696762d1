//! Token codec
//!
//! Builds, signs and verifies the four token kinds. Each kind belongs to a
//! [`TrustDomain`], and each domain has its own HMAC key, so a leaked
//! access-signing key cannot mint admin or api-key tokens.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SecretKey;
use crate::{Error, Result, UserClaims};

/// Admin tokens are short-lived and not configurable
pub const ADMIN_TOKEN_TTL_SECONDS: i64 = 300;

/// Upper bound for configured lifetimes (100 years)
pub const MAX_TOKEN_LIFETIME_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

const PRIMARY_AUDIENCE: &[&str] = &["customer", "admin"];
const ADMIN_AUDIENCE: &[&str] = &["admin"];
const API_KEY_AUDIENCE: &[&str] = &["api"];

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub issuer: String,
    /// Signs access and refresh tokens
    pub secret_key: SecretKey,
    /// Signs admin tokens
    pub admin_key: SecretKey,
    /// Signs api-key tokens
    pub api_key: SecretKey,
    pub access_expires_at: u64,
    pub refresh_expires_at: u64,
    pub api_key_expires_at: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "passport-api".to_string(),
            secret_key: SecretKey::default(),
            admin_key: SecretKey::default(),
            api_key: SecretKey::default(),
            access_expires_at: 86400,     // 1 day
            refresh_expires_at: 604800,   // 7 days
            api_key_expires_at: 31536000, // 365 days
        }
    }
}

impl JwtConfig {
    pub fn validate(&self) -> Result<()> {
        let keys = [
            ("secret_key", &self.secret_key),
            ("admin_key", &self.admin_key),
            ("api_key", &self.api_key),
        ];
        for (name, key) in keys {
            if key.is_empty() {
                return Err(Error::Config(format!("jwt.{} is not configured", name)));
            }
            if key.as_bytes().len() < 32 {
                warn!("jwt.{} is shorter than recommended (32 bytes)", name);
            }
        }
        if self.secret_key == self.admin_key
            || self.secret_key == self.api_key
            || self.admin_key == self.api_key
        {
            return Err(Error::Config("jwt keys must be distinct per trust domain".to_string()));
        }
        let lifetimes = [
            ("access_expires_at", self.access_expires_at),
            ("refresh_expires_at", self.refresh_expires_at),
            ("api_key_expires_at", self.api_key_expires_at),
        ];
        for (name, seconds) in lifetimes {
            if seconds == 0 || seconds > MAX_TOKEN_LIFETIME_SECONDS {
                return Err(Error::Config(format!(
                    "jwt.{} must be between 1 and {} seconds",
                    name, MAX_TOKEN_LIFETIME_SECONDS
                )));
            }
        }
        if self.issuer.is_empty() {
            return Err(Error::Config("jwt.issuer is not configured".to_string()));
        }
        Ok(())
    }
}

/// Kind of token, which fixes its subject, audience, lifetime and key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    Admin,
    ApiKey,
}

/// Signing key family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustDomain {
    /// Access and refresh tokens
    Primary,
    Admin,
    ApiKey,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Admin => "admin",
            Self::ApiKey => "apikey",
        }
    }

    /// Value of the `sub` claim
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Access => "access-token",
            Self::Refresh => "refresh-token",
            Self::Admin => "admin-token",
            Self::ApiKey => "api-key",
        }
    }

    pub fn trust_domain(&self) -> TrustDomain {
        match self {
            Self::Access | Self::Refresh => TrustDomain::Primary,
            Self::Admin => TrustDomain::Admin,
            Self::ApiKey => TrustDomain::ApiKey,
        }
    }

    /// Whether tokens of this kind embed [`UserClaims`]
    pub fn carries_claims(&self) -> bool {
        matches!(self, Self::Access | Self::Refresh)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            "admin" => Ok(Self::Admin),
            "apikey" | "api-key" => Ok(Self::ApiKey),
            other => Err(Error::UnknownTokenType(other.to_string())),
        }
    }
}

impl TrustDomain {
    pub fn audience(&self) -> &'static [&'static str] {
        match self {
            Self::Primary => PRIMARY_AUDIENCE,
            Self::Admin => ADMIN_AUDIENCE,
            Self::ApiKey => API_KEY_AUDIENCE,
        }
    }
}

/// Registered JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    /// Unique per token so rotation never reproduces an earlier value
    pub jti: String,
}

/// Full payload of a signed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<UserClaims>,
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

impl TokenClaims {
    /// Embedded user claims, required for access and refresh tokens
    pub fn user_claims(&self) -> Result<&UserClaims> {
        self.claims
            .as_ref()
            .ok_or_else(|| Error::InvalidToken("claims type is invalid".to_string()))
    }

    /// Reject tokens minted for a different purpose within the same domain
    pub fn expect_kind(&self, kind: TokenKind) -> Result<()> {
        if self.registered.sub == kind.subject() {
            Ok(())
        } else {
            Err(Error::InvalidToken(format!("expected a {} token", kind)))
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.registered.exp
    }
}

/// An unsigned token. Only [`TokenCodec`] can build one, so its expiry is
/// always in the future at issuance.
#[derive(Debug, Clone)]
pub struct Token {
    kind: TokenKind,
    body: TokenClaims,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn claims(&self) -> Option<&UserClaims> {
        self.body.claims.as_ref()
    }

    pub fn registered(&self) -> &RegisteredClaims {
        &self.body.registered
    }

    pub fn expires_at(&self) -> i64 {
        self.body.registered.exp
    }
}

struct DomainKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl DomainKeys {
    fn new(key: &SecretKey, issuer: &str, domain: TrustDomain) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Any HMAC variant verifies against the shared secret; anything else
        // in the header is a forged-algorithm attempt.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_audience(domain.audience());
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }
}

/// Issues, signs and parses tokens for every trust domain
pub struct TokenCodec {
    config: JwtConfig,
    header: Header,
    primary: DomainKeys,
    admin: DomainKeys,
    api_key: DomainKeys,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.config.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Result<Self> {
        config.validate()?;

        let primary = DomainKeys::new(&config.secret_key, &config.issuer, TrustDomain::Primary);
        let admin = DomainKeys::new(&config.admin_key, &config.issuer, TrustDomain::Admin);
        let api_key = DomainKeys::new(&config.api_key, &config.issuer, TrustDomain::ApiKey);

        Ok(Self {
            config,
            header: Header::new(Algorithm::HS256),
            primary,
            admin,
            api_key,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    fn keys(&self, domain: TrustDomain) -> &DomainKeys {
        match domain {
            TrustDomain::Primary => &self.primary,
            TrustDomain::Admin => &self.admin,
            TrustDomain::ApiKey => &self.api_key,
        }
    }

    /// Lifetime in seconds for freshly issued tokens of `kind`
    pub fn lifetime(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => lifetime_seconds(self.config.access_expires_at),
            TokenKind::Refresh => lifetime_seconds(self.config.refresh_expires_at),
            TokenKind::Admin => ADMIN_TOKEN_TTL_SECONDS,
            TokenKind::ApiKey => lifetime_seconds(self.config.api_key_expires_at),
        }
    }

    /// Build an unsigned token of `kind`.
    ///
    /// Access and refresh tokens must be given claims; admin and api-key
    /// tokens never carry any and ignore what they are given.
    pub fn issue(&self, kind: TokenKind, claims: Option<&UserClaims>) -> Result<Token> {
        let claims = if kind.carries_claims() {
            let claims = claims.ok_or_else(|| {
                Error::Validation(format!("{} token requires user claims", kind))
            })?;
            Some(claims.clone())
        } else {
            None
        };

        let now = Utc::now().timestamp();
        let expires_at = now.checked_add(self.lifetime(kind)).ok_or_else(|| {
            Error::Config(format!("{} token lifetime overflows the clock", kind))
        })?;
        Ok(self.build(kind, claims, expires_at, now))
    }

    fn build(
        &self,
        kind: TokenKind,
        claims: Option<UserClaims>,
        expires_at: i64,
        now: i64,
    ) -> Token {
        let audience = kind.trust_domain().audience();

        Token {
            kind,
            body: TokenClaims {
                claims,
                registered: RegisteredClaims {
                    iss: self.config.issuer.clone(),
                    sub: kind.subject().to_string(),
                    aud: audience.iter().map(|a| a.to_string()).collect(),
                    exp: expires_at,
                    nbf: now,
                    iat: now,
                    jti: Uuid::new_v4().to_string(),
                },
            },
        }
    }

    /// Serialize and sign with the key of the token's trust domain
    pub fn sign(&self, token: &Token) -> Result<String> {
        let keys = self.keys(token.kind.trust_domain());
        encode(&self.header, &token.body, &keys.encoding).map_err(|e| {
            tracing::error!(kind = %token.kind, "token signing failed: {}", e);
            Error::Signing(e)
        })
    }

    /// [`issue`](Self::issue) followed by [`sign`](Self::sign)
    pub fn issue_signed(&self, kind: TokenKind, claims: Option<&UserClaims>) -> Result<String> {
        let token = self.issue(kind, claims)?;
        self.sign(&token)
    }

    /// Verify `token` against the key and audience of `domain`
    pub fn parse(&self, token: &str, domain: TrustDomain) -> Result<TokenClaims> {
        let keys = self.keys(domain);
        match decode::<TokenClaims>(token, &keys.decoding, &keys.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                let err = map_decode_error(e);
                debug!(?domain, "token rejected: {}", err);
                Err(err)
            }
        }
    }

    /// Sign a new refresh token that keeps an existing absolute expiry.
    ///
    /// Used on rotation so refreshing never extends the outer session
    /// lifetime.
    pub fn repeat_token(&self, claims: &UserClaims, expires_at: i64) -> Result<String> {
        let now = Utc::now().timestamp();
        if expires_at <= now {
            return Err(Error::TokenExpired);
        }
        let token = self.build(TokenKind::Refresh, Some(claims.clone()), expires_at, now);
        self.sign(&token)
    }
}

fn lifetime_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        JwtErrorKind::InvalidToken | JwtErrorKind::Base64(_) | JwtErrorKind::Utf8(_) => {
            Error::MalformedToken
        }
        JwtErrorKind::ExpiredSignature => Error::TokenExpired,
        JwtErrorKind::Json(_) => Error::InvalidToken("claims type is invalid".to_string()),
        JwtErrorKind::InvalidAlgorithm => {
            Error::InvalidToken("signing method is invalid".to_string())
        }
        _ => Error::InvalidToken(e.to_string()),
    }
}
