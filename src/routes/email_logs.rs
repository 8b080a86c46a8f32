/**
 * Email Log Routes
 * Outbox history for the admin
 */
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::email_logs::{self as store, EmailLogFilter};
use crate::db::models::{EmailKind, EmailLog, EmailStatus};
use crate::error::ApiResult;
use crate::routes::enum_param;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EmailLogQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/admin/email-logs?status=&type=
pub async fn list_email_logs(
    State(state): State<AppState>,
    Query(query): Query<EmailLogQuery>,
) -> ApiResult<Json<Vec<EmailLog>>> {
    let filter = EmailLogFilter {
        status: enum_param::<EmailStatus>(&query.status)?,
        kind: enum_param::<EmailKind>(&query.kind)?,
    };
    Ok(Json(store::list(state.store.pool(), &filter).await?))
}
