use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated**. Everything else in the API requires a token
/// issued by the login route below.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and container orchestration. Returns "ok".
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Exchanges email + password for a JWT. Failed attempts are logged at warn level.
        .route("/api/auth/login", post(handlers::auth::login))
}
