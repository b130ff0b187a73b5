use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{ADMIN, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    error::{AppError, AppResult, ErrorBody},
    models::{CreateCustomerRequest, Customer, UpdateCustomerRequest},
    repository::CustomerFilter,
};

/// list_customers
///
/// [Authenticated Route] Lists customers by name, optionally filtered by `?search=`.
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "customers",
    params(CustomerFilter),
    responses((status = 200, description = "Customers", body = [Customer]))
)]
pub async fn list_customers(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> AppResult<Json<Vec<Customer>>> {
    Ok(Json(state.repo.list_customers(filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Found", body = Customer),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_customer(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    state
        .repo
        .get_customer(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Customer"))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Created", body = Customer),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn create_customer(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateCustomerRequest>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    payload.validate()?;

    let customer = state
        .repo
        .create_customer(Customer {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            phone: payload.phone.trim().to_string(),
            address: payload.address,
            total_purchases: BigDecimal::from(0).with_scale(2),
            created_at: Utc::now(),
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "Customer")
            .entity_id(customer.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(customer_id = %customer.id, "customer created");

    Ok(created(customer))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Updated", body = Customer),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_customer(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> AppResult<Json<Customer>> {
    payload.validate()?;

    let customer = state
        .repo
        .update_customer(id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Update, "Customer")
            .entity_id(customer.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(customer_id = %customer.id, "customer updated");

    Ok(Json(customer))
}

/// delete_customer
///
/// [Admin Route] Customers with sales or service requests cannot be deleted (409).
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Still referenced", body = ErrorBody)
    )
)]
pub async fn delete_customer(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    actor.require_role(ADMIN)?;

    if !state.repo.delete_customer(id).await? {
        return Err(AppError::not_found("Customer"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "Customer")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(customer_id = %id, "customer deleted");

    Ok(StatusCode::NO_CONTENT)
}
