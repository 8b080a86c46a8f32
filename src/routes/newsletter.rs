/**
 * Newsletter Routes
 * Public subscribe/unsubscribe, admin subscriber management and broadcasts
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{EmailKind, NewEmail, Newsletter};
use crate::db::newsletter as store;
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::{bool_param, non_empty, MessageResponse};
use crate::services::email::templates;
use crate::AppState;

const DEFAULT_LANGUAGE: &str = "fr";

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeQuery {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberListQuery {
    pub active: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberUpdate {
    pub active: Option<bool>,
    pub name: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NewsletterSendResponse {
    pub message: String,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

// ============================================================================
// Public
// ============================================================================

/// POST /api/public/newsletter/subscribe
///
/// An inactive subscription for the same address is reactivated instead of
/// duplicated.
pub async fn subscribe(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SubscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::invalid("A valid email is required"));
    }
    let name = req.name.trim();
    let language = non_empty(&req.language).unwrap_or(DEFAULT_LANGUAGE);

    let pool = state.store.pool();
    match store::find_by_email(pool, &email).await? {
        Some(existing) if existing.active => Err(ApiError::conflict("Email already subscribed")),
        Some(mut existing) => {
            existing.active = true;
            if !name.is_empty() {
                existing.name = name.to_string();
            }
            existing.language = language.to_string();
            let subscriber = store::update(pool, &existing).await?;
            tracing::info!(subscriber_id = subscriber.id, "newsletter subscription reactivated");
            Ok((
                StatusCode::OK,
                Json(MessageResponse::new("Successfully subscribed to newsletter")),
            ))
        }
        None => {
            let subscriber = store::insert(pool, &email, name, language).await?;
            tracing::info!(subscriber_id = subscriber.id, "newsletter subscription created");
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::new("Successfully subscribed to newsletter")),
            ))
        }
    }
}

/// GET /api/public/newsletter/unsubscribe?token=
pub async fn unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let token = non_empty(&query.token).ok_or_else(|| ApiError::invalid("Token is required"))?;
    let subscriber = store::unsubscribe(state.store.pool(), token).await?;
    tracing::info!(subscriber_id = subscriber.id, "newsletter unsubscribed");
    Ok(Json(MessageResponse::new("Successfully unsubscribed")))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/newsletter/subscribers?active=
pub async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberListQuery>,
) -> ApiResult<Json<Vec<Newsletter>>> {
    let active = bool_param(&query.active, "active")?;
    Ok(Json(store::list(state.store.pool(), active).await?))
}

/// PUT /api/admin/newsletter/subscribers/{id}
pub async fn update_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SubscriberUpdate>,
) -> ApiResult<Json<Newsletter>> {
    let id = parse_id(&id, "subscriber")?;
    let mut subscriber = store::get(state.store.pool(), id).await?;

    if let Some(active) = req.active {
        subscriber.active = active;
    }
    if let Some(name) = non_empty(&req.name) {
        subscriber.name = name.to_string();
    }
    if let Some(language) = non_empty(&req.language) {
        subscriber.language = language.to_string();
    }

    Ok(Json(store::update(state.store.pool(), &subscriber).await?))
}

/// DELETE /api/admin/newsletter/subscribers/{id}
pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "subscriber")?;
    store::delete(state.store.pool(), id).await?;
    Ok(Json(MessageResponse::new("Subscriber deleted successfully")))
}

fn unsubscribe_url(site_url: &str, token: &str) -> String {
    format!(
        "{}/api/public/newsletter/unsubscribe?token={}",
        site_url.trim_end_matches('/'),
        token
    )
}

/// POST /api/admin/newsletter/send
///
/// Sends one personalised email per active subscriber, one after another.
/// Failed deliveries stay in the outbox for retry.
pub async fn send_newsletter(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewsletterRequest>,
) -> ApiResult<Json<NewsletterSendResponse>> {
    let subject = req.subject.trim();
    if subject.is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::invalid("Subject and content are required"));
    }

    let subscribers = store::list(state.store.pool(), Some(true)).await?;
    let branding = &state.config.branding;
    let (mut sent, mut failed) = (0, 0);

    for subscriber in &subscribers {
        let link = unsubscribe_url(&branding.site_url, &subscriber.unsub_token);
        let rendered = templates::newsletter(branding, subject, &req.content, &link);
        let result = state
            .outbox
            .send_now(&NewEmail {
                to: subscriber.email.clone(),
                subject: rendered.subject,
                kind: EmailKind::Newsletter,
                body: rendered.html,
                client_id: None,
            })
            .await;

        match result {
            Ok((_, outcome)) if outcome.is_sent() => sent += 1,
            Ok(_) => failed += 1,
            Err(e) => {
                tracing::error!(subscriber_id = subscriber.id, error = %e, "newsletter email not recorded");
                failed += 1;
            }
        }
    }

    tracing::info!(total = subscribers.len(), sent, failed, "newsletter sent");
    Ok(Json(NewsletterSendResponse {
        message: "Newsletter sent".to_string(),
        total: subscribers.len(),
        sent,
        failed,
    }))
}
