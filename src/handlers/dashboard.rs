use axum::{Json, extract::State};

use crate::{AppState, auth::AuthUser, error::AppResult, models::DashboardStats};

/// dashboard_stats
///
/// [Authenticated Route] Headline counters for the dashboard landing page.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "dashboard",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn dashboard_stats(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(state.repo.dashboard_stats().await?))
}
