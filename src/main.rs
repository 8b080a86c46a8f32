//! Angel Event Backend - binary entry point
//! Delegates to the library for all app logic.

use angel_event_backend::{config::AppConfig, logging};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&config);

    if let Err(e) = angel_event_backend::run(config).await {
        tracing::error!(error = %e, "server stopped");
        eprintln!("FATAL: {}", e);
        std::process::exit(1);
    }
}
