use axum::{Json, extract::State};
use validator::Validate;

use crate::{
    AppState,
    audit::{self, AuditAction, AuditEntry},
    auth::{AuthUser, ClientIp, issue_token},
    error::{AppError, AppResult, ErrorBody},
    models::{AuthResponse, LoginRequest, UserResponse},
    password::verify_password,
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

/// login
///
/// [Public Route] Exchanges email and password for a signed JWT.
///
/// Unknown emails, wrong passwords and deactivated accounts all produce the same 401 so
/// the response does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;

    let user = match state.repo.find_user_by_email(payload.email.trim()).await? {
        Some(user) if user.is_active => user,
        _ => {
            tracing::warn!(email = %payload.email, "login rejected: unknown or inactive user");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let token = issue_token(&user, &state.config)?;

    let actor = AuthUser::from(user.clone());
    audit::record(
        &state.repo,
        AuditEntry::new(&actor, AuditAction::Login, "User")
            .entity_id(user.id)
            .ip(&ip),
    )
    .await;

    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok(Json(AuthResponse {
        token,
        user_id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    }))
}

/// me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn me(AuthUser { id, .. }: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserResponse>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(user.into()))
}
