/*!
 * Logging Module
 * Centralized logging configuration and utilities
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::AppConfig;

const LOG_DIR: &str = "logs";

fn default_filter(log_level: &str) -> String {
    format!(
        "angel_event_backend={},tower_http=debug,axum=info,sqlx=warn",
        log_level
    )
}

/// Destinations for the three output layers.
pub(crate) struct Writers {
    pub file: BoxMakeWriter,
    pub error: BoxMakeWriter,
    pub console: BoxMakeWriter,
}

/// Initialize the logging system.
///
/// The returned guards flush the non-blocking writers when dropped, so the
/// caller must keep them alive until shutdown.
pub fn init(config: &AppConfig) -> Vec<WorkerGuard> {
    let is_production = config.is_production();

    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("failed to create log directory '{}': {}", LOG_DIR, e);
    }

    // File appender for all logs
    let file_appender = rolling::daily(LOG_DIR, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // File appender for errors only
    let error_appender = rolling::daily(LOG_DIR, "error.log");
    let (error_writer, error_guard) = non_blocking(error_appender);

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if is_production {
            "info".to_string()
        } else {
            "debug".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&log_level)));

    let writers = Writers {
        file: BoxMakeWriter::new(file_writer),
        error: BoxMakeWriter::new(error_writer),
        console: BoxMakeWriter::new(console_writer),
    };
    build_subscriber(is_production, env_filter, writers).init();

    tracing::info!("Logging initialized for {} environment", config.environment);

    vec![file_guard, error_guard, console_guard]
}

pub(crate) fn build_subscriber(
    is_production: bool,
    env_filter: EnvFilter,
    writers: Writers,
) -> Box<dyn Subscriber + Send + Sync> {
    // Errors only, JSON in every environment
    let error_layer = fmt::layer()
        .json()
        .with_writer(writers.error)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(LevelFilter::ERROR);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(error_layer);

    if is_production {
        // JSON format for production
        let file_layer = fmt::layer()
            .json()
            .with_writer(writers.file)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .json()
            .with_writer(writers.console)
            .with_target(false);

        Box::new(subscriber.with(file_layer).with(console_layer))
    } else {
        // Pretty format for development
        let file_layer = fmt::layer()
            .with_writer(writers.file)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(writers.console)
            .with_target(true)
            .pretty()
            .with_thread_ids(false)
            .with_thread_names(false);

        Box::new(subscriber.with(file_layer).with(console_layer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_default_filter_targets_this_crate() {
        let filter = default_filter("warn");
        assert!(filter.starts_with("angel_event_backend=warn"));
        assert!(EnvFilter::try_new(filter).is_ok());
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn writer(capture: &Capture) -> BoxMakeWriter {
        let capture = capture.clone();
        BoxMakeWriter::new(move || capture.clone())
    }

    #[test]
    fn test_error_log_only_receives_errors_in_both_environments() {
        for is_production in [true, false] {
            let (file, error, console) = (Capture::default(), Capture::default(), Capture::default());
            let subscriber = build_subscriber(
                is_production,
                EnvFilter::new("info"),
                Writers {
                    file: writer(&file),
                    error: writer(&error),
                    console: writer(&console),
                },
            );

            tracing::subscriber::with_default(subscriber, || {
                tracing::info!("booking received");
                tracing::error!("smtp unreachable");
            });

            assert!(file.text().contains("booking received"));
            assert!(file.text().contains("smtp unreachable"));
            assert!(console.text().contains("booking received"));
            assert!(error.text().contains("smtp unreachable"));
            assert!(!error.text().contains("booking received"));
        }
    }
}
