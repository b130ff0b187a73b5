use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::created;
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    billing::request_number,
    error::{AppError, AppResult, ErrorBody},
    models::{
        CreateServiceRequest, ServiceRequest, ServiceRequestChanges, ServiceRequestResponse,
        ServiceStatus, UpdateServiceRequest, UpdateServiceStatusRequest,
    },
};

#[utoipa::path(
    get,
    path = "/api/services",
    tag = "services",
    responses((status = 200, description = "Service requests, newest first", body = [ServiceRequestResponse]))
)]
pub async fn list_service_requests(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ServiceRequestResponse>>> {
    Ok(Json(state.repo.list_service_requests().await?))
}

#[utoipa::path(
    get,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = Uuid, Path, description = "Service request ID")),
    responses(
        (status = 200, description = "Found", body = ServiceRequestResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_service_request(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ServiceRequestResponse>> {
    state
        .repo
        .get_service_request(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Service request"))
}

/// create_service_request
///
/// [Authenticated Route] Opens a request for a customer with status `New` and a fresh
/// `SR-` request number.
#[utoipa::path(
    post,
    path = "/api/services",
    tag = "services",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Created", body = ServiceRequestResponse),
        (status = 404, description = "Customer not found", body = ErrorBody)
    )
)]
pub async fn create_service_request(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateServiceRequest>,
) -> AppResult<(StatusCode, Json<ServiceRequestResponse>)> {
    payload.validate()?;

    if state.repo.get_customer(payload.customer_id).await?.is_none() {
        return Err(AppError::not_found("Customer"));
    }

    let now = Utc::now();
    let request = state
        .repo
        .create_service_request(ServiceRequest {
            id: Uuid::new_v4(),
            request_number: request_number(now),
            customer_id: payload.customer_id,
            request_type: payload.request_type.trim().to_string(),
            description: payload.description,
            status: ServiceStatus::New,
            request_date: now,
            completed_date: None,
            created_at: now,
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "ServiceRequest")
            .entity_id(request.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(request_id = %request.id, number = %request.request_number, "service request created");

    Ok(created(request))
}

/// update_service_request
///
/// [Authenticated Route] Partial update. A status change follows the same completion
/// rule as `PATCH /status`.
#[utoipa::path(
    put,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = Uuid, Path, description = "Service request ID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Updated", body = ServiceRequestResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_service_request(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServiceRequest>,
) -> AppResult<Json<ServiceRequestResponse>> {
    payload.validate()?;

    let existing = state
        .repo
        .get_service_request(id)
        .await?
        .ok_or_else(|| AppError::not_found("Service request"))?;

    let completed_date = match payload.status {
        Some(status) => status.completed_date(existing.completed_date, Utc::now()),
        None => existing.completed_date,
    };

    let request = state
        .repo
        .update_service_request(
            id,
            ServiceRequestChanges {
                request_type: payload.request_type.map(|t| t.trim().to_string()),
                description: payload.description,
                status: payload.status,
                completed_date,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Service request"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Update, "ServiceRequest")
            .entity_id(request.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(request_id = %request.id, status = %request.status, "service request updated");

    Ok(Json(request))
}

/// update_service_status
///
/// [Authenticated Route] Moves a request to a new status. Closing stamps the completion
/// date; any other status clears it.
#[utoipa::path(
    patch,
    path = "/api/services/{id}/status",
    tag = "services",
    params(("id" = Uuid, Path, description = "Service request ID")),
    request_body = UpdateServiceStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ServiceRequestResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_service_status(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServiceStatusRequest>,
) -> AppResult<Json<ServiceRequestResponse>> {
    let existing = state
        .repo
        .get_service_request(id)
        .await?
        .ok_or_else(|| AppError::not_found("Service request"))?;

    let changes = ServiceRequestChanges {
        status: Some(payload.status),
        completed_date: payload.status.completed_date(existing.completed_date, Utc::now()),
        ..Default::default()
    };

    let request = state
        .repo
        .update_service_request(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("Service request"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::StatusChange, "ServiceRequest")
            .entity_id(request.id)
            .details(json!({ "from": existing.status, "to": request.status }))
            .ip(&ip),
    )
    .await;
    tracing::info!(
        request_id = %request.id,
        from = %existing.status,
        to = %request.status,
        "service request status changed"
    );

    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    tag = "services",
    params(("id" = Uuid, Path, description = "Service request ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_service_request(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.repo.delete_service_request(id).await? {
        return Err(AppError::not_found("Service request"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "ServiceRequest")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(request_id = %id, "service request deleted");

    Ok(StatusCode::NO_CONTENT)
}
