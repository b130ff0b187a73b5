use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{ADMIN, FINANCE, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    billing::{ensure_money_in_range, round_money},
    error::{AppError, AppResult, ErrorBody},
    models::{
        Agent, AgentResponse, CommissionResponse, CreateAgentRequest, UpdateAgentRequest, UserRole,
    },
};

#[utoipa::path(
    get,
    path = "/api/agents",
    tag = "agents",
    responses(
        (status = 200, description = "Agents", body = [AgentResponse]),
        (status = 403, description = "Admin or Accountant only", body = ErrorBody)
    )
)]
pub async fn list_agents(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AgentResponse>>> {
    user.require_role(FINANCE)?;
    Ok(Json(state.repo.list_agents().await?))
}

#[utoipa::path(
    get,
    path = "/api/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Found", body = AgentResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_agent(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AgentResponse>> {
    user.require_role(FINANCE)?;
    state
        .repo
        .get_agent(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Agent"))
}

/// list_agent_commissions
///
/// [Authenticated Route] Commissions earned by one agent. Open to Admin and Accountant,
/// and to the agent's own user account.
#[utoipa::path(
    get,
    path = "/api/agents/{id}/commissions",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Commissions, newest first", body = [CommissionResponse]),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn list_agent_commissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CommissionResponse>>> {
    let agent = state.repo.get_agent(id).await?;

    // Unknown ids are 403 for anyone who may only read their own record.
    if !agent.as_ref().is_some_and(|a| a.user_id == user.id) {
        user.require_role(FINANCE)?;
    }
    let agent = agent.ok_or_else(|| AppError::not_found("Agent"))?;

    Ok(Json(state.repo.list_agent_commissions(agent.id).await?))
}

/// create_agent
///
/// [Admin Route] Attaches an agent record to an existing user holding the Agent role.
/// A user can have at most one agent record.
#[utoipa::path(
    post,
    path = "/api/agents",
    tag = "agents",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Created", body = AgentResponse),
        (status = 400, description = "User is not an agent", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Agent already exists for user", body = ErrorBody)
    )
)]
pub async fn create_agent(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateAgentRequest>,
) -> AppResult<(StatusCode, Json<AgentResponse>)> {
    actor.require_role(ADMIN)?;
    payload.validate()?;

    let user = state
        .repo
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if user.role != UserRole::Agent {
        return Err(AppError::validation("User must have the Agent role"));
    }
    if state.repo.get_agent_by_user(user.id).await?.is_some() {
        return Err(AppError::conflict("An agent record already exists for this user"));
    }

    let balance = payload.balance.unwrap_or_else(|| BigDecimal::from(0));
    ensure_money_in_range("Balance", &balance)?;

    let agent = state
        .repo
        .create_agent(Agent {
            id: Uuid::new_v4(),
            user_id: user.id,
            balance: round_money(&balance),
            assigned_licenses: payload.assigned_licenses.unwrap_or(0),
            sold_licenses: 0,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "Agent")
            .entity_id(agent.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(agent_id = %agent.id, user_id = %user.id, "agent created");

    Ok(created(agent))
}

#[utoipa::path(
    put,
    path = "/api/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent ID")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Updated", body = AgentResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_agent(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateAgentRequest>,
) -> AppResult<Json<AgentResponse>> {
    actor.require_role(ADMIN)?;
    payload.validate()?;

    if let Some(balance) = &payload.balance {
        ensure_money_in_range("Balance", balance)?;
    }
    payload.balance = payload.balance.as_ref().map(round_money);

    let agent = state
        .repo
        .update_agent(id, payload)
        .await?
        .ok_or_else(|| AppError::not_found("Agent"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Update, "Agent")
            .entity_id(agent.id)
            .ip(&ip),
    )
    .await;
    tracing::info!(agent_id = %agent.id, "agent updated");

    Ok(Json(agent))
}

#[utoipa::path(
    delete,
    path = "/api/agents/{id}",
    tag = "agents",
    params(("id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Commissions exist", body = ErrorBody)
    )
)]
pub async fn delete_agent(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    actor.require_role(ADMIN)?;

    if !state.repo.delete_agent(id).await? {
        return Err(AppError::not_found("Agent"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "Agent")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(agent_id = %id, "agent deleted");

    Ok(StatusCode::NO_CONTENT)
}
