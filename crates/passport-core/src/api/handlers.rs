//! Route handlers for the users API

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, ErrorResponse};
use crate::{Error, Passport, Registration, UserCredential, UserProfile};

const SIGN_UP_TRACE: &str = "users-001";
const SIGN_IN_TRACE: &str = "users-002";
const REFRESH_TRACE: &str = "users-003";
const SIGN_OUT_TRACE: &str = "users-004";
const SIGN_UP_ADMIN_TRACE: &str = "users-005";
const ADMIN_TOKEN_TRACE: &str = "users-006";
const PROFILE_TRACE: &str = "users-007";

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignOutRequest {
    pub oauth_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn route_not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            trace_id: "middleware-001".to_string(),
            message: "route not found".to_string(),
        }),
    )
}

pub async fn sign_up_customer(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<Passport>), ApiError> {
    let passport = state
        .sessions
        .register_customer(&registration)
        .await
        .map_err(ApiError::with(SIGN_UP_TRACE))?;
    Ok((StatusCode::CREATED, Json(passport)))
}

pub async fn sign_up_admin(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<Passport>), ApiError> {
    let passport = state
        .sessions
        .register_admin(&registration)
        .await
        .map_err(ApiError::with(SIGN_UP_ADMIN_TRACE))?;
    Ok((StatusCode::CREATED, Json(passport)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(credential): Json<UserCredential>,
) -> Result<Json<Passport>, ApiError> {
    let passport = state
        .sessions
        .sign_in(&credential)
        .await
        .map_err(ApiError::with(SIGN_IN_TRACE))?;
    Ok(Json(passport))
}

pub async fn refresh_passport(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Passport>, ApiError> {
    let passport = state
        .sessions
        .refresh(&request.refresh_token)
        .await
        .map_err(ApiError::with(REFRESH_TRACE))?;
    Ok(Json(passport))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Json(request): Json<SignOutRequest>,
) -> Result<StatusCode, ApiError> {
    if request.oauth_id.is_empty() {
        return Err(ApiError::new(
            SIGN_OUT_TRACE,
            Error::Validation("oauth_id is required".to_string()),
        ));
    }

    state
        .sessions
        .sign_out(&request.oauth_id)
        .await
        .map_err(ApiError::with(SIGN_OUT_TRACE))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate_admin_token(
    State(state): State<AppState>,
) -> Result<Json<AdminTokenResponse>, ApiError> {
    let token = state
        .sessions
        .issue_admin_token()
        .map_err(ApiError::with(ADMIN_TOKEN_TRACE))?;
    Ok(Json(AdminTokenResponse { token }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state
        .sessions
        .get_profile(&user_id)
        .await
        .map_err(ApiError::with(PROFILE_TRACE))?;
    Ok(Json(profile))
}
