/**
 * Client Routes
 * Admin CRUD over clients plus one-off emails to a client
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Client, ClientWithBookings, EmailKind, NewClient, NewEmail};
use crate::db::{bookings, clients as store};
use crate::error::{parse_id, ApiError, ApiJson, ApiResult};
use crate::routes::{non_empty, MessageResponse};
use crate::services::email::templates;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClientListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientEmailRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ClientEmailResponse {
    pub message: String,
    pub email_log_id: i64,
}

fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::invalid("A valid email is required"));
    }
    Ok(email)
}

/// GET /api/admin/clients?search=
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientListQuery>,
) -> ApiResult<Json<Vec<Client>>> {
    let clients = store::list(state.store.pool(), non_empty(&query.search)).await?;
    Ok(Json(clients))
}

/// POST /api/admin/clients
pub async fn create_client(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateClientRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("Name is required"));
    }
    let new = NewClient {
        name: name.to_string(),
        email: normalize_email(&req.email)?,
        phone: req.phone.trim().to_string(),
        notes: req.notes,
    };

    let client = store::insert(state.store.pool(), &new).await?;
    tracing::info!(client_id = client.id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/admin/clients/{id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ClientWithBookings>> {
    let id = parse_id(&id, "client")?;
    let client = store::get(state.store.pool(), id).await?;
    let bookings = bookings::list_for_client(state.store.pool(), id).await?;
    Ok(Json(ClientWithBookings { client, bookings }))
}

/// PUT /api/admin/clients/{id}
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateClientRequest>,
) -> ApiResult<Json<Client>> {
    let id = parse_id(&id, "client")?;
    let mut client = store::get(state.store.pool(), id).await?;

    if let Some(name) = req.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::invalid("Name cannot be empty"));
        }
        client.name = name.to_string();
    }
    if let Some(email) = req.email {
        client.email = normalize_email(&email)?;
    }
    if let Some(phone) = req.phone {
        client.phone = phone.trim().to_string();
    }
    if let Some(notes) = req.notes {
        client.notes = notes;
    }

    Ok(Json(store::update(state.store.pool(), &client).await?))
}

/// DELETE /api/admin/clients/{id}
pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "client")?;
    store::delete(state.store.pool(), id).await?;
    tracing::info!(client_id = id, "client deleted");
    Ok(Json(MessageResponse::new("Client deleted successfully")))
}

/// POST /api/admin/clients/{id}/email
///
/// Sent immediately through the outbox; a failed first attempt is reported
/// as 500 while the row stays queued for retry.
pub async fn email_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ClientEmailRequest>,
) -> ApiResult<Json<ClientEmailResponse>> {
    let id = parse_id(&id, "client")?;
    let subject = req.subject.trim();
    if subject.is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::invalid("Subject and message are required"));
    }

    let client = store::get(state.store.pool(), id).await?;
    let rendered = templates::custom_message(&state.config.branding, &client.name, subject, &req.message);

    let (log, outcome) = state
        .outbox
        .send_now(&NewEmail {
            to: client.email.clone(),
            subject: rendered.subject,
            kind: EmailKind::Custom,
            body: rendered.html,
            client_id: Some(client.id),
        })
        .await?;

    if !outcome.is_sent() {
        tracing::warn!(client_id = client.id, email_log_id = log.id, ?outcome, "client email not delivered");
        return Err(ApiError::internal("Failed to send email"));
    }

    Ok(Json(ClientEmailResponse {
        message: "Email sent successfully".to_string(),
        email_log_id: log.id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::db::email_logs::{self, EmailLogFilter};
    use crate::db::models::{EmailKind, EmailStatus};
    use crate::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn create(app: &TestApp, token: &str, name: &str, email: &str) -> serde_json::Value {
        let (status, body) = app
            .send_json(
                Method::POST,
                "/api/admin/clients",
                json!({"name": name, "email": email, "phone": "0600000000"}),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test]
    async fn test_create_and_search_clients() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let alice = create(&app, &token, "Alice Martin", "Alice@Example.com").await;
        assert_eq!(alice["email"], "alice@example.com");
        create(&app, &token, "Bob", "bob@example.com").await;

        let (_, all) = app.get("/api/admin/clients", Some(&token)).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[0]["name"], "Bob");

        let (_, found) = app.get("/api/admin/clients?search=MARTIN", Some(&token)).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["id"], alice["id"]);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        create(&app, &token, "Alice", "alice@example.com").await;

        let (status, _) = app
            .send_json(
                Method::POST,
                "/api/admin/clients",
                json!({"name": "Other", "email": "ALICE@example.com"}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send_json(
                Method::POST,
                "/api/admin/clients",
                json!({"name": "", "email": "x@example.com"}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_includes_bookings() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        app.send_json(
            Method::POST,
            "/api/public/bookings",
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "event_date": "2025-06-14",
                "budget": 500
            }),
            None,
        )
        .await;

        let (_, list) = app.get("/api/admin/clients", Some(&token)).await;
        let id = &list[0]["id"];
        let (status, body) = app.get(&format!("/api/admin/clients/{}", id), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
        assert_eq!(body["bookings"][0]["event_date"], "2025-06-14");
    }

    #[tokio::test]
    async fn test_update_overlays_fields() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let alice = create(&app, &token, "Alice", "alice@example.com").await;
        let uri = format!("/api/admin/clients/{}", alice["id"]);

        let (status, body) = app
            .send_json(Method::PUT, &uri, json!({"notes": "prefers email"}), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notes"], "prefers email");
        assert_eq!(body["name"], "Alice");
        assert_eq!(body["phone"], "0600000000");
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let alice = create(&app, &token, "Alice", "alice@example.com").await;
        let uri = format!("/api/admin/clients/{}", alice["id"]);

        let (status, body) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());

        let (status, _) = app.delete(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The address is free again once the row is soft-deleted.
        create(&app, &token, "Alice", "alice@example.com").await;
    }

    #[tokio::test]
    async fn test_email_client_sends_and_logs() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let alice = create(&app, &token, "Alice", "alice@example.com").await;
        let uri = format!("/api/admin/clients/{}/email", alice["id"]);

        let (status, _) = app
            .send_json(
                Method::POST,
                &uri,
                json!({"subject": "Votre devis", "message": "Bonjour\n<b>merci</b>"}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert!(!sent[0].html_body.contains("<b>merci</b>"));

        let logs = email_logs::list(
            app.state.store.pool(),
            &EmailLogFilter {
                kind: Some(EmailKind::Custom),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, EmailStatus::Sent);
        assert_eq!(logs[0].client_id, alice["id"].as_i64());
    }

    #[tokio::test]
    async fn test_email_client_failure_is_500() {
        let app = TestApp::new().await;
        let token = app.admin_token().await;
        let alice = create(&app, &token, "Alice", "alice@example.com").await;
        app.mailer.set_failing(true);

        let (status, _) = app
            .send_json(
                Method::POST,
                &format!("/api/admin/clients/{}/email", alice["id"]),
                json!({"subject": "Hello", "message": "Hi"}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let logs = email_logs::list(app.state.store.pool(), &EmailLogFilter::default())
            .await
            .unwrap();
        assert_eq!(logs[0].status, EmailStatus::Failed);
        assert!(logs[0].error.is_some());
    }
}
