/**
 * Dashboard Routes
 * Headline figures for the admin home page
 */
use axum::{extract::State, Json};
use chrono::Utc;

use crate::db::stats::{self, DashboardStats};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/admin/dashboard/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let today = Utc::now().date_naive();
    Ok(Json(stats::dashboard(state.store.pool(), today).await?))
}
