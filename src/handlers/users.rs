use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{ADMIN, created};
use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp},
    error::{AppError, AppResult, ErrorBody},
    models::{CreateUserRequest, UpdateUserRequest, User, UserChanges, UserResponse},
    password::hash_password,
};

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Admin only", body = ErrorBody)
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserResponse>>> {
    user.require_role(ADMIN)?;
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let found = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(found.into()))
}

/// create_user
///
/// [Admin Route] Creates an account. The password is hashed before it reaches the repository.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn create_user(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    actor.require_role(ADMIN)?;
    payload.validate()?;

    let email = payload.email.trim().to_string();
    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("Email already exists"));
    }

    let user = state
        .repo
        .create_user(User {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email,
            password_hash: hash_password(&payload.password)?,
            role: payload.role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Create, "User")
            .entity_id(user.id)
            .details(json!({ "email": user.email, "role": user.role }))
            .ip(&ip),
    )
    .await;
    tracing::info!(user_id = %user.id, role = %user.role, "user created");

    Ok(created(user.into()))
}

/// update_user
///
/// [Admin Route] Partial update. A supplied password is re-hashed; an email change is
/// rejected with 409 when another account already uses it.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    actor.require_role(ADMIN)?;
    payload.validate()?;

    let email = payload.email.as_deref().map(str::trim).map(str::to_string);
    if let Some(email) = &email {
        if let Some(existing) = state.repo.find_user_by_email(email).await? {
            if existing.id != id {
                return Err(AppError::conflict("Email already exists"));
            }
        }
    }

    let password_hash = payload.password.as_deref().map(hash_password).transpose()?;

    let changes = UserChanges {
        name: payload.name.map(|n| n.trim().to_string()),
        email,
        password_hash,
        role: payload.role,
        is_active: payload.is_active,
    };

    let user = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Update, "User")
            .entity_id(user.id)
            .details(json!({
                "role": user.role,
                "isActive": user.is_active,
                "passwordChanged": payload.password.is_some(),
            }))
            .ip(&ip),
    )
    .await;
    tracing::info!(user_id = %user.id, "user updated");

    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Cannot delete own account", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Still referenced", body = ErrorBody)
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    actor.require_role(ADMIN)?;

    if actor.id == id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    if !state.repo.delete_user(id).await? {
        return Err(AppError::not_found("User"));
    }

    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Delete, "User")
            .entity_id(id)
            .ip(&ip),
    )
    .await;
    tracing::info!(user_id = %id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}
