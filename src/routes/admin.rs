use crate::{AppState, handlers::audit_logs};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Routes where every method is Admin-only. `create_router` wraps this router in the
/// authentication layer and then the admin role check, so handlers here do not repeat it.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/auditlogs
        // The full audit trail, newest first.
        .route("/auditlogs", get(audit_logs::list_audit_logs))
        // GET /api/auditlogs/user/{user_id}
        // Everything one user did.
        .route("/auditlogs/user/{user_id}", get(audit_logs::list_user_audit_logs))
        // GET /api/auditlogs/entity/{entity}/{entity_id}
        // The history of a single record.
        .route(
            "/auditlogs/entity/{entity}/{entity_id}",
            get(audit_logs::list_entity_audit_logs),
        )
}
