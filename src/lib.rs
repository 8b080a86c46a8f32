//! Angel Event Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::{AppConfig, DEFAULT_JWT_SECRET};
use crate::db::{Store, StoreError};
use crate::services::email::{LogMailer, MailError, Mailer, Outbox, SmtpMailer};
use crate::services::scanner::{self, ScanError, ScannerConfig};

/// Global request body cap; multipart uploads are the largest bodies.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub outbox: Outbox,
    pub scanner: Arc<ScannerConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,

    #[error("database error: {0}")]
    Store(#[from] StoreError),

    #[error("mailer error: {0}")]
    Mail(#[from] MailError),

    #[error("storage scanner configuration error: {0}")]
    Scanner(#[from] ScanError),

    #[error("invalid bind address '{0}'")]
    BindAddr(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configure CORS for the configured frontend origins.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn public_routes() -> Router<AppState> {
    use routes::*;

    Router::new()
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/availability", get(bookings::check_availability))
        .route("/availabilities", get(availability::list_month))
        .route(
            "/testimonials",
            get(testimonials::list_public).post(testimonials::submit),
        )
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/unsubscribe", get(newsletter::unsubscribe))
        .route("/gallery", get(gallery::list_images))
        .route("/gallery/random", get(gallery::random_images))
        .route("/rentals", get(rentals::list_rentals))
        .route("/categories", get(categories::list_categories))
        .route("/content", get(content::get_content))
        .route("/contact", post(contact::send_contact))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    use routes::auth;

    Router::new()
        .route("/me", get(auth::me))
        .route("/change-password", post(auth::change_password))
        .route_layer(middleware::from_fn_with_state(state, auth::require_auth))
        .route("/login", post(auth::login))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    use routes::*;

    Router::new()
        .route("/dashboard/stats", get(dashboard::get_stats))
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/{id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/{id}/email", post(clients::email_client))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/status", put(bookings::update_status))
        .route(
            "/availabilities",
            get(availability::list_month).post(availability::set_availability),
        )
        .route(
            "/testimonials",
            get(testimonials::list_all).post(testimonials::create),
        )
        .route(
            "/testimonials/{id}",
            put(testimonials::update).delete(testimonials::delete),
        )
        .route("/newsletter/subscribers", get(newsletter::list_subscribers))
        .route(
            "/newsletter/subscribers/{id}",
            put(newsletter::update_subscriber).delete(newsletter::delete_subscriber),
        )
        .route("/newsletter/send", post(newsletter::send_newsletter))
        .route(
            "/gallery",
            get(gallery::list_images).post(gallery::create_image),
        )
        .route(
            "/gallery/{id}",
            put(gallery::update_image).delete(gallery::delete_image),
        )
        .route("/gallery/scan", post(gallery::scan_storage))
        .route("/gallery/categories", get(gallery::category_stats))
        .route(
            "/rentals",
            get(rentals::list_rentals).post(rentals::create_rental),
        )
        .route(
            "/rentals/{id}",
            get(rentals::get_rental)
                .put(rentals::update_rental)
                .delete(rentals::delete_rental),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/content",
            get(content::get_content).put(content::update_content),
        )
        .route("/email-logs", get(email_logs::list_email_logs))
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config.allowed_origins);
    tracing::info!(origins = ?state.config.allowed_origins, "CORS configured");

    let api = Router::new()
        .nest("/public", public_routes())
        .nest("/auth", auth_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()));

    Router::new()
        .nest("/api", api)
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .nest_service("/uploads", ServeDir::new(&state.config.storage.upload_dir))
        .nest_service("/storage", ServeDir::new(&state.config.storage.storage_dir))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Multipart extraction has its own 2 MB default; lift it to the global cap.
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>, StartupError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
            Ok(Arc::new(SmtpMailer::new(smtp)?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Run the server (used by main).
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    if config.is_production() && config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        return Err(StartupError::InsecureJwtSecret);
    }

    let store = Store::connect(&config.database).await?;
    store.migrate().await?;
    store.seed_defaults(&config.auth).await?;

    let outbox = Outbox::new(store.clone(), build_mailer(&config)?);
    outbox.recover_interrupted().await?;

    let scanner_config = ScannerConfig::from_storage(&config.storage)?;
    match scanner::scan(&store, &scanner_config).await {
        Ok(report) => tracing::info!(?report, "startup storage scan finished"),
        Err(e) => tracing::error!(error = %e, "startup storage scan failed"),
    }

    let _worker = outbox.spawn_worker();

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .map_err(|_| StartupError::BindAddr(config.bind_addr()))?;

    let state = AppState {
        config: Arc::new(config),
        store,
        outbox,
        scanner: Arc::new(scanner_config),
    };
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
