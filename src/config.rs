//! Application configuration read from environment variables (optionally
//! loaded from `.env` by `dotenvy` before this runs).

use std::path::PathBuf;

use crate::db::DbConfig;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    /// Seeded admin account. The password is only used at boot to create or
    /// resync the bcrypt hash.
    pub admin_email: String,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
}

/// Values interpolated into outgoing emails.
#[derive(Debug, Clone)]
pub struct Branding {
    pub business_name: String,
    pub site_url: String,
    pub contact_email: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub rental_subdir: String,
    pub keywords_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub database: DbConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub smtp: Option<SmtpConfig>,
    /// Where booking notifications and contact-form relays are sent.
    pub admin_notification_email: Option<String>,
    pub branding: Branding,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_email = env_or("ADMIN_EMAIL", "admin@angelevent.com");

        let smtp = env_opt("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587),
            username: env_or("SMTP_USER", ""),
            password: env_or("SMTP_PASSWORD", ""),
            from_name: env_or("SMTP_FROM_NAME", "Angel Event"),
            from_email: env_or("SMTP_FROM_EMAIL", "contact@angelevent.com"),
        });

        // FRONTEND_URL may hold one origin; ALLOWED_ORIGINS a comma list.
        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .or_else(|| env_opt("FRONTEND_URL"))
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ]
            });

        Self {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT", 8081),
            allowed_origins,
            database: DbConfig::default(),
            storage: StorageConfig {
                upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "./uploads")),
                storage_dir: PathBuf::from(env_or("STORAGE_DIR", "../storage")),
                rental_subdir: env_or("RENTAL_STORAGE_SUBDIR", "location"),
                keywords_file: env_opt("RENTAL_KEYWORDS_FILE").map(PathBuf::from),
            },
            auth: AuthConfig {
                jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
                token_expiry_hours: env_parse("JWT_EXPIRY_HOURS", 24),
                admin_email: admin_email.clone(),
                admin_password: env_opt("ADMIN_PASSWORD"),
            },
            smtp,
            admin_notification_email: Some(admin_email.clone()),
            branding: Branding {
                business_name: env_or("BUSINESS_NAME", "Angel Event"),
                site_url: env_or("SITE_URL", "http://localhost:5173"),
                contact_email: env_or("CONTACT_EMAIL", &admin_email),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
