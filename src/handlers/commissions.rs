use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{FINANCE, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    billing::{commission_amount, round_money},
    error::{AppError, AppResult, ErrorBody},
    models::{Commission, CommissionResponse, CommissionType, CreateCommissionRequest},
};

#[utoipa::path(
    get,
    path = "/api/commissions",
    tag = "commissions",
    responses(
        (status = 200, description = "Commissions, newest first", body = [CommissionResponse]),
        (status = 403, description = "Admin or Accountant only", body = ErrorBody)
    )
)]
pub async fn list_commissions(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CommissionResponse>>> {
    user.require_role(FINANCE)?;
    Ok(Json(state.repo.list_commissions().await?))
}

/// create_commission
///
/// [Admin/Accountant Route] Books a commission for an agent on a sale and credits the
/// agent's balance. When the sale was attributed to an agent, only that agent can earn on it.
#[utoipa::path(
    post,
    path = "/api/commissions",
    tag = "commissions",
    request_body = CreateCommissionRequest,
    responses(
        (status = 201, description = "Created", body = CommissionResponse),
        (status = 400, description = "Invalid rate or agent mismatch", body = ErrorBody),
        (status = 404, description = "Sale or agent not found", body = ErrorBody)
    )
)]
pub async fn create_commission(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateCommissionRequest>,
) -> AppResult<(StatusCode, Json<CommissionResponse>)> {
    actor.require_role(FINANCE)?;
    payload.validate()?;

    let sale = state
        .repo
        .get_sale(payload.sale_id)
        .await?
        .ok_or_else(|| AppError::not_found("Sale"))?;
    let agent = state
        .repo
        .get_agent(payload.agent_id)
        .await?
        .ok_or_else(|| AppError::not_found("Agent"))?;

    match sale.agent_id {
        Some(sale_agent) if sale_agent != agent.id => {
            return Err(AppError::validation("The sale was made by a different agent"));
        }
        _ => {}
    }

    let sale_cost = match payload.commission_type {
        CommissionType::PercentageOfProfit => state.repo.sale_cost(sale.id).await?,
        _ => BigDecimal::from(0),
    };
    let rate = round_money(&payload.rate);
    let amount = commission_amount(
        payload.commission_type,
        &rate,
        &sale.total_amount,
        &sale_cost,
    )?;

    let now = Utc::now();
    let commission = state
        .repo
        .create_commission(Commission {
            id: Uuid::new_v4(),
            agent_id: agent.id,
            sale_id: sale.id,
            commission_type: payload.commission_type,
            rate,
            amount,
            earned_date: now,
            created_at: now,
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "Commission")
            .entity_id(commission.id)
            .details(json!({
                "agentId": agent.id,
                "saleId": sale.id,
                "amount": commission.amount.to_string(),
            }))
            .ip(&ip),
    )
    .await;
    tracing::info!(
        commission_id = %commission.id,
        agent_id = %agent.id,
        amount = %commission.amount,
        "commission created"
    );

    Ok(created(commission))
}
