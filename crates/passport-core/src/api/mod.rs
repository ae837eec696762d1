//! REST API for passport-core
//!
//! Thin boundary over [`SessionManager`] and [`AuthorizationGate`]: it
//! extracts bearer tokens, maps typed errors to status codes and never
//! echoes internal error text for authentication failures.

mod error;
mod handlers;
mod middleware;
mod security_headers;

use std::sync::Arc;

use axum::http::Method;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{AuthorizationGate, SessionManager, ADMIN_ROLE_ID};

pub use error::{ApiError, ErrorResponse};
pub use handlers::{AdminTokenResponse, HealthResponse, RefreshRequest, SignOutRequest};
pub use middleware::{RoleGuard, ADMIN_TOKEN_HEADER};
pub use security_headers::security_headers_middleware;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub gate: AuthorizationGate,
}

impl AppState {
    pub fn new(sessions: SessionManager, gate: AuthorizationGate) -> Self {
        Self {
            sessions: Arc::new(sessions),
            gate,
        }
    }
}

/// Create the REST API router
pub fn create_router(state: AppState) -> Router {
    let require_access = from_fn_with_state(state.clone(), middleware::jwt_auth);
    let require_admin_role = from_fn_with_state(
        RoleGuard::new(state.clone(), &[ADMIN_ROLE_ID]),
        middleware::authorize,
    );
    let require_admin_token = from_fn_with_state(state.clone(), middleware::admin_token_auth);

    // Route layers run bottom-up: the last one added sees the request first.
    let users = Router::new()
        .route("/signup", post(handlers::sign_up_customer))
        .route("/signin", post(handlers::sign_in))
        .route("/refresh", post(handlers::refresh_passport))
        .route("/signout", post(handlers::sign_out))
        .route(
            "/signup-admin",
            post(handlers::sign_up_admin).route_layer(require_admin_token),
        )
        .route(
            "/admin/secret",
            get(handlers::generate_admin_token)
                .route_layer(require_admin_role)
                .route_layer(require_access.clone()),
        )
        .route(
            "/:user_id",
            get(handlers::get_profile)
                .route_layer(from_fn(middleware::params_check))
                .route_layer(require_access),
        );

    let cors = CorsLayer::new().allow_origin(Any).allow_methods([
        Method::GET,
        Method::POST,
        Method::HEAD,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
    ]);

    Router::new()
        .route("/v1/", get(handlers::health_check))
        .nest("/v1/users", users)
        .fallback(handlers::route_not_found)
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
