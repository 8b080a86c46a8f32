//! Router-level test harness: in-memory database, recording mailer and a
//! throwaway directory for uploads and storage.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{AppConfig, AuthConfig, Branding, StorageConfig};
use crate::db::{users, DbConfig, Store};
use crate::routes::auth::{create_access_token, ADMIN_ROLE};
use crate::services::email::testing::RecordingMailer;
use crate::services::email::Outbox;
use crate::services::scanner::ScannerConfig;
use crate::{create_app, AppState};

pub const ADMIN_EMAIL: &str = "admin@angelevent.com";
pub const ADMIN_PASSWORD: &str = "s3cret-password";
const BOUNDARY: &str = "angel-event-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            upload_dir: dir.path().join("uploads"),
            storage_dir: dir.path().join("storage"),
            rental_subdir: "location".to_string(),
            keywords_file: None,
        };

        let config = AppConfig {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            database: DbConfig::default(),
            storage: storage.clone(),
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_expiry_hours: 1,
                admin_email: ADMIN_EMAIL.to_string(),
                admin_password: None,
            },
            smtp: None,
            admin_notification_email: Some("owner@angelevent.com".to_string()),
            branding: Branding {
                business_name: "Angel Event".to_string(),
                site_url: "http://localhost:5173".to_string(),
                contact_email: "contact@angelevent.com".to_string(),
            },
        };

        let store = Store::in_memory().await.unwrap();
        store.migrate().await.unwrap();

        // Low bcrypt cost keeps the login tests fast.
        let hash = bcrypt::hash(ADMIN_PASSWORD, 4).unwrap();
        users::insert(store.pool(), ADMIN_EMAIL, &hash, "Admin", ADMIN_ROLE)
            .await
            .unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let outbox = Outbox::new(store.clone(), mailer.clone());
        let scanner = ScannerConfig::from_storage(&storage).unwrap();

        let state = AppState {
            config: Arc::new(config),
            store,
            outbox,
            scanner: Arc::new(scanner),
        };

        Self { state, mailer, dir }
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    pub async fn admin_token(&self) -> String {
        let user = users::find_by_email(self.state.store.pool(), ADMIN_EMAIL)
            .await
            .unwrap()
            .unwrap();
        create_access_token(&self.state.config.auth, &user).unwrap()
    }

    /// Creates an account with the given role and returns a token for it.
    pub async fn user_token(&self, email: &str, role: &str) -> String {
        let hash = bcrypt::hash("irrelevant-password", 4).unwrap();
        let user = users::insert(self.state.store.pool(), email, &hash, "User", role)
            .await
            .unwrap();
        create_access_token(&self.state.config.auth, &user).unwrap()
    }

    pub async fn raw(&self, req: Request<Body>) -> Response<Body> {
        self.router().oneshot(req).await.unwrap()
    }

    /// Sends the request and decodes the body as JSON (`Null` when empty).
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.raw(req).await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let req = with_token(Request::get(uri), token)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let req = with_token(Request::delete(uri), token)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let req = with_token(Request::builder().method(method).uri(uri), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(req).await
    }

    /// Multipart request with text fields and an optional `image` file.
    pub async fn send_multipart(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = with_token(Request::builder().method(method).uri(uri), token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }
}

fn with_token(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}
