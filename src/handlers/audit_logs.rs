use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppResult, ErrorBody},
    models::AuditLogResponse,
    repository::{AuditFilter, AuditPage},
};

// The admin router's middleware has already rejected non-admin callers.
// Every listing is paged with `limit` (at most 500) and `offset`.

#[utoipa::path(
    get,
    path = "/api/auditlogs",
    tag = "audit",
    params(AuditPage),
    responses(
        (status = 200, description = "Audit trail, newest first", body = [AuditLogResponse]),
        (status = 403, description = "Admin only", body = ErrorBody)
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(page): Query<AuditPage>,
) -> AppResult<Json<Vec<AuditLogResponse>>> {
    Ok(Json(state.repo.list_audit_logs(AuditFilter::All, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/auditlogs/user/{user_id}",
    tag = "audit",
    params(("user_id" = Uuid, Path, description = "Acting user ID"), AuditPage),
    responses((status = 200, description = "Entries by one user", body = [AuditLogResponse]))
)]
pub async fn list_user_audit_logs(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<AuditPage>,
) -> AppResult<Json<Vec<AuditLogResponse>>> {
    Ok(Json(state.repo.list_audit_logs(AuditFilter::User(user_id), page).await?))
}

/// list_entity_audit_logs
///
/// [Admin Route] History of one record, e.g. `/api/auditlogs/entity/Sale/{id}`.
/// The entity name is matched case-insensitively.
#[utoipa::path(
    get,
    path = "/api/auditlogs/entity/{entity}/{entity_id}",
    tag = "audit",
    params(
        ("entity" = String, Path, description = "Entity name, e.g. Sale"),
        ("entity_id" = String, Path, description = "Entity ID"),
        AuditPage
    ),
    responses((status = 200, description = "Entries for one record", body = [AuditLogResponse]))
)]
pub async fn list_entity_audit_logs(
    State(state): State<AppState>,
    Path((entity, entity_id)): Path<(String, String)>,
    Query(page): Query<AuditPage>,
) -> AppResult<Json<Vec<AuditLogResponse>>> {
    let filter = AuditFilter::Entity { entity, entity_id };
    Ok(Json(state.repo.list_audit_logs(filter, page).await?))
}
