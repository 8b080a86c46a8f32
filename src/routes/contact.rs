/**
 * Contact Route
 * Relays the public contact form to the business owner
 */
use axum::{extract::State, Json};
use serde::Deserialize;

use crate::db::models::{EmailKind, NewEmail};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::routes::MessageResponse;
use crate::services::email::templates;
use crate::AppState;

const DEFAULT_SUBJECT: &str = "Contact";

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// POST /api/public/contact
pub async fn send_contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::invalid("Name and message are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::invalid("A valid email is required"));
    }

    let Some(admin) = state.config.admin_notification_email.as_deref() else {
        tracing::error!("contact form received but ADMIN_NOTIFICATION_EMAIL is not configured");
        return Err(ApiError::internal("Failed to send message"));
    };

    let subject = req
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUBJECT);
    let rendered = templates::contact_relay(
        &state.config.branding,
        name,
        email,
        req.phone.trim(),
        subject,
        &req.message,
    );

    let (log, outcome) = state
        .outbox
        .send_now(&NewEmail {
            to: admin.to_string(),
            subject: rendered.subject,
            kind: EmailKind::Contact,
            body: rendered.html,
            client_id: None,
        })
        .await?;

    if !outcome.is_sent() {
        tracing::warn!(email_log_id = log.id, ?outcome, "contact message not delivered");
        return Err(ApiError::internal("Failed to send message"));
    }
    Ok(Json(MessageResponse::new("Message sent successfully")))
}
