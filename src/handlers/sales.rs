use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{ADMIN, COLLECTORS, SELLERS, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    billing::{apply_payment, price_sale, round_money},
    error::{AppError, AppResult, ErrorBody},
    models::{CreatePaymentRequest, CreateSaleRequest, Payment, SaleDetails, SaleResponse},
};

#[utoipa::path(
    get,
    path = "/api/sales",
    tag = "sales",
    responses((status = 200, description = "Sales with items and payments, newest first", body = [SaleDetails]))
)]
pub async fn list_sales(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SaleDetails>>> {
    Ok(Json(state.repo.list_sales().await?))
}

#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "sales",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale with items and payments", body = SaleDetails),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_sale(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SaleDetails>> {
    state
        .repo
        .get_sale_details(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Sale"))
}

/// create_sale
///
/// [Admin/Agent Route] Prices the basket against current product rows, then persists the
/// sale, its items and (for cash/card) the settling payment in one transaction that also
/// takes the stock and credits the customer's purchase total.
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Created", body = SaleDetails),
        (status = 400, description = "Invalid basket", body = ErrorBody),
        (status = 404, description = "Customer or agent not found", body = ErrorBody),
        (status = 409, description = "Insufficient stock", body = ErrorBody)
    )
)]
pub async fn create_sale(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateSaleRequest>,
) -> AppResult<(StatusCode, Json<SaleDetails>)> {
    actor.require_role(SELLERS)?;
    payload.validate()?;

    if state.repo.get_customer(payload.customer_id).await?.is_none() {
        return Err(AppError::not_found("Customer"));
    }
    if let Some(agent_id) = payload.agent_id {
        if state.repo.get_agent(agent_id).await?.is_none() {
            return Err(AppError::not_found("Agent"));
        }
    }

    let mut product_ids: Vec<Uuid> = payload.items.iter().map(|item| item.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let products = state.repo.get_products(&product_ids).await?;

    let draft = price_sale(&payload, &products, Utc::now())?;
    let sale = state.repo.create_sale(draft).await?;

    let details = state
        .repo
        .get_sale_details(sale.id)
        .await?
        .ok_or_else(|| AppError::not_found("Sale"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "Sale")
            .entity_id(sale.id)
            .details(json!({
                "invoiceNumber": sale.invoice_number,
                "totalAmount": sale.total_amount.to_string(),
                "paymentType": sale.payment_type,
            }))
            .ip(&ip),
    )
    .await;
    tracing::info!(
        sale_id = %sale.id,
        invoice = %sale.invoice_number,
        total = %sale.total_amount,
        "sale created"
    );

    Ok(created(details))
}

/// delete_sale
///
/// [Admin Route] Voids a sale: stock and the customer's purchase total are restored,
/// items and payments are removed with it. Sales with commissions cannot be voided (409).
#[utoipa::path(
    delete,
    path = "/api/sales/{id}",
    tag = "sales",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Commissions exist", body = ErrorBody)
    )
)]
pub async fn delete_sale(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    actor.require_role(ADMIN)?;

    if !state.repo.delete_sale(id).await? {
        return Err(AppError::not_found("Sale"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "Sale")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(sale_id = %id, "sale deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/sales/{id}/payments",
    tag = "sales",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Payments, oldest first", body = [Payment]),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn list_payments(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    if state.repo.get_sale(id).await?.is_none() {
        return Err(AppError::not_found("Sale"));
    }
    Ok(Json(state.repo.list_payments(id).await?))
}

/// add_payment
///
/// [Admin/Accountant/Agent Route] Records a payment against an outstanding sale. The
/// amount must be positive and no more than what is still owed.
#[utoipa::path(
    post,
    path = "/api/sales/{id}/payments",
    tag = "sales",
    params(("id" = Uuid, Path, description = "Sale ID")),
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = Payment),
        (status = 400, description = "Invalid amount or sale already paid", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Concurrent payment", body = ErrorBody)
    )
)]
pub async fn add_payment(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    actor.require_role(COLLECTORS)?;
    payload.validate()?;

    let sale = state
        .repo
        .get_sale(id)
        .await?
        .ok_or_else(|| AppError::not_found("Sale"))?;

    let amount = round_money(&payload.amount);
    let settlement = apply_payment(&sale, &amount)?;

    let now = Utc::now();
    let payment = state
        .repo
        .add_payment(
            Payment {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                amount,
                payment_type: payload.payment_type,
                payment_date: now,
                reference: payload.reference,
                created_at: now,
                updated_at: None,
            },
            settlement.clone(),
        )
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Payment, "Sale")
            .entity_id(sale.id)
            .details(json!({
                "paymentId": payment.id,
                "amount": payment.amount.to_string(),
                "remainingAmount": settlement.remaining_amount.to_string(),
                "isPaid": settlement.is_paid,
            }))
            .ip(&ip),
    )
    .await;
    tracing::info!(
        sale_id = %sale.id,
        amount = %payment.amount,
        remaining = %settlement.remaining_amount,
        "payment recorded"
    );

    Ok(created(payment))
}
