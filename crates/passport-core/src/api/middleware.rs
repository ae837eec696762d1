//! Request guards
//!
//! Each guard either rejects the request with an [`ApiError`] or passes it
//! on, possibly after attaching the caller's [`UserClaims`] to the request
//! extensions.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use super::{ApiError, AppState};
use crate::{Error, UserClaims};

/// Header carrying the admin token on the admin sign-up route
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const JWT_AUTH_TRACE: &str = "middleware-002";
const PARAMS_CHECK_TRACE: &str = "middleware-003";
const AUTHORIZE_TRACE: &str = "middleware-004";
const ADMIN_TOKEN_TRACE: &str = "middleware-005";

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Require a live access token and attach its claims to the request
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::new(JWT_AUTH_TRACE, Error::MalformedToken))?;

    let claims = state
        .sessions
        .authenticate(&token)
        .await
        .map_err(ApiError::with(JWT_AUTH_TRACE))?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Only let callers read their own resources
pub async fn params_check(
    Path(user_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<UserClaims>()
        .ok_or_else(|| ApiError::new(PARAMS_CHECK_TRACE, Error::MalformedToken))?;

    if caller.id != user_id {
        tracing::debug!(caller = %caller.id, requested = %user_id, "path does not match caller");
        return Err(ApiError::new(PARAMS_CHECK_TRACE, Error::PermissionDenied));
    }
    Ok(next.run(request).await)
}

/// State for [`authorize`]: the roles a route accepts
#[derive(Clone)]
pub struct RoleGuard {
    state: AppState,
    accepted: Arc<[i64]>,
}

impl RoleGuard {
    pub fn new(state: AppState, accepted: &[i64]) -> Self {
        Self {
            state,
            accepted: accepted.into(),
        }
    }
}

/// Require the caller's role to intersect the route's accepted roles.
/// Must run after [`jwt_auth`].
pub async fn authorize(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let role_id = request
        .extensions()
        .get::<UserClaims>()
        .map(|claims| claims.role_id)
        .ok_or_else(|| {
            ApiError::new(AUTHORIZE_TRACE, Error::InvalidRole("caller role is missing".to_string()))
        })?;

    guard
        .state
        .gate
        .authorize(role_id, &guard.accepted)
        .await
        .map_err(ApiError::with(AUTHORIZE_TRACE))?;

    Ok(next.run(request).await)
}

/// Require a valid admin token in the `X-Admin-Token` header
pub async fn admin_token_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::new(ADMIN_TOKEN_TRACE, Error::MalformedToken))?;

    state
        .sessions
        .verify_admin_token(token)
        .map_err(ApiError::with(ADMIN_TOKEN_TRACE))?;

    Ok(next.run(request).await)
}
