pub mod availability;
pub mod bookings;
pub mod categories;
pub mod clients;
pub mod content;
pub mod email_logs;
pub mod gallery;
pub mod models;
pub mod newsletter;
pub mod rentals;
pub mod stats;
pub mod testimonials;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteExecutor;

use crate::config::AuthConfig;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://angel_event.db?mode=rwc".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} already exists: {detail}")]
    AlreadyExists { entity: &'static str, detail: String },

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        StoreError::NotFound { entity }
    }
}

/// Maps a unique-constraint violation to `AlreadyExists`, anything else to `Sqlx`.
pub(crate) fn unique_violation(
    entity: &'static str,
    detail: impl Into<String>,
) -> impl FnOnce(sqlx::Error) -> StoreError {
    let detail = detail.into();
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::AlreadyExists { entity, detail }
        }
        _ => StoreError::Sqlx(e),
    }
}

/// Marks a live row deleted. A row that is missing or already deleted is `NotFound`.
pub(crate) async fn soft_delete<'e, E>(
    ex: E,
    table: &'static str,
    entity: &'static str,
    id: i64,
) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        table
    );
    let result = sqlx::query(&sql)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(ex)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found(entity));
    }
    Ok(())
}

/// Handle to the SQLite database, cloned into every request through the app state.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(config: &DbConfig) -> StoreResult<Self> {
        tracing::info!("Initializing database connection pool...");
        tracing::debug!(url = %config.url, "database url");

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;
        tracing::info!(
            busy_timeout_ms = BUSY_TIMEOUT.as_millis() as u64,
            "Database connection pool initialized (SQLite WAL)"
        );

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection that is never recycled
    /// keeps the data alive for the lifetime of the pool.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> StoreResult<Duration> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    /// Creates missing tables and indexes, then seeds categories and migrates
    /// the legacy rental category column. Safe to run on every boot.
    pub async fn migrate(&self) -> StoreResult<()> {
        tracing::info!("Running database migrations...");

        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        self.seed_categories().await?;
        self.migrate_legacy_rental_category().await?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }

    async fn seed_categories(&self) -> StoreResult<()> {
        // Deleted rows count: an admin who removed every category keeps it that way.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for &(slug, name, kind) in DEFAULT_CATEGORIES {
            sqlx::query(
                "INSERT INTO categories (name, slug, description, type, created_at, updated_at)
                 VALUES (?, ?, '', ?, ?, ?)",
            )
            .bind(name)
            .bind(slug)
            .bind(kind)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(count = DEFAULT_CATEGORIES.len(), "Default categories seeded");
        Ok(())
    }

    async fn migrate_legacy_rental_category(&self) -> StoreResult<()> {
        let columns: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('rental_items')")
                .fetch_all(&self.pool)
                .await?;
        let has = |col: &str| columns.iter().any(|(name,)| name == col);

        if !has("category_id") {
            sqlx::query("ALTER TABLE rental_items ADD COLUMN category_id INTEGER REFERENCES categories(id)")
                .execute(&self.pool)
                .await?;
        }
        if !has("category") {
            return Ok(());
        }

        tracing::info!("Migrating legacy rental_items.category column");
        let mut tx = self.pool.begin().await?;
        let backfilled = sqlx::query(
            r#"
            UPDATE rental_items
            SET category_id = COALESCE(
                (SELECT c.id FROM categories c
                 WHERE c.slug = LOWER(TRIM(rental_items.category)) AND c.deleted_at IS NULL),
                (SELECT c.id FROM categories c
                 WHERE c.slug = 'other' AND c.deleted_at IS NULL)
            )
            WHERE category_id IS NULL
            "#,
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("ALTER TABLE rental_items DROP COLUMN category")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(backfilled, "Legacy rental category column dropped");
        Ok(())
    }

    /// First-boot data: admin account, site content and a starter rental
    /// catalogue, each only when its table is empty. When both ADMIN_EMAIL
    /// and ADMIN_PASSWORD are set the admin password is kept in sync.
    pub async fn seed_defaults(&self, auth: &AuthConfig) -> StoreResult<()> {
        self.seed_admin(auth).await?;
        self.seed_content().await?;
        self.seed_rentals().await?;
        Ok(())
    }

    async fn seed_admin(&self, auth: &AuthConfig) -> StoreResult<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            let password = auth
                .admin_password
                .clone()
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
            if auth.admin_password.is_none() {
                tracing::warn!(
                    "SECURITY: ADMIN_PASSWORD is not set; the default admin password is in use"
                );
            }
            let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
            users::insert(&self.pool, &auth.admin_email, &hash, "Administrator", "admin").await?;
            tracing::info!(email = %auth.admin_email, "Default admin user created");
            return Ok(());
        }

        if let Some(password) = &auth.admin_password {
            if let Some(user) = users::find_by_email(&self.pool, &auth.admin_email).await? {
                if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
                    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
                    users::update_password(&self.pool, user.id, &hash).await?;
                    tracing::info!(email = %user.email, "Admin password synced from environment");
                }
            }
        }
        Ok(())
    }

    async fn seed_content(&self) -> StoreResult<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM site_contents")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for &(key, value, section) in DEFAULT_CONTENT {
            content::upsert(&self.pool, key, value, "fr", section).await?;
        }
        tracing::info!("Default site content seeded");
        Ok(())
    }

    async fn seed_rentals(&self) -> StoreResult<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rental_items")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for &(title, description, price, slug, featured) in DEFAULT_RENTALS {
            let category_id = categories::find_by_slug(&self.pool, slug)
                .await?
                .map(|c| c.id);
            rentals::insert(
                &self.pool,
                &models::NewRentalItem {
                    title: title.to_string(),
                    description: description.to_string(),
                    price,
                    category_id,
                    image_url: "/uploads/rentals/default-rental.png".to_string(),
                    featured,
                    available: true,
                },
            )
            .await?;
        }
        tracing::info!("Default rental items seeded");
        Ok(())
    }
}

const DEFAULT_ADMIN_PASSWORD: &str = "ChangeThisPassword123!";

const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("flower", "Fleurs", "rental"),
    ("centerpiece", "Centres de table", "rental"),
    ("backdrop", "Arches et murs", "rental"),
    ("animation", "Animation", "rental"),
    ("other", "Autres", "rental"),
    ("wedding", "Mariage", "gallery"),
    ("marryme", "Demande en mariage", "gallery"),
    ("birthday", "Anniversaire", "gallery"),
    ("baby_shower", "Baby shower", "gallery"),
    ("bapteme", "Baptême", "gallery"),
    ("loveroom", "Love room", "gallery"),
    ("congrats", "Félicitations", "gallery"),
];

const DEFAULT_CONTENT: &[(&str, &str, &str)] = &[
    (
        "hero_title",
        "Chaque événement mérite une mise en scène inoubliable",
        "home",
    ),
    ("hero_subtitle", "Créer l'instant parfait", "home"),
    ("about_title", "À propos d'Angel Event", "about"),
    (
        "about_description",
        "Nous transformons vos rêves en réalité avec passion, excellence et un sens du détail incomparable.",
        "about",
    ),
];

const DEFAULT_RENTALS: &[(&str, &str, f64, &str, bool)] = &[
    (
        "Arche Ronde Dorée",
        "Une magnifique arche ronde dorée pour sublimer votre décor de cérémonie ou photobooth.",
        50.0,
        "backdrop",
        true,
    ),
    (
        "Centre de Table Floral",
        "Composition florale élégante dans des tons blanc et crème, idéale pour les mariages.",
        25.0,
        "centerpiece",
        true,
    ),
    (
        "Mur de Fleurs Blanc",
        "Mur de fleurs artificielles haute qualité, dimensions 2m x 2m. Impact visuel garanti.",
        120.0,
        "backdrop",
        false,
    ),
    (
        "Vase Haut Cylindrique",
        "Vase en verre transparent, hauteur 60cm. Parfait pour les compositions modernes.",
        15.0,
        "other",
        false,
    ),
    (
        "Bouquet de Pivoines",
        "Bouquet de pivoines artificielles réalistes.",
        10.0,
        "flower",
        false,
    ),
];

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL DEFAULT 'admin',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL DEFAULT '',
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_email ON clients(email) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        type TEXT NOT NULL DEFAULT 'rental',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_slug ON categories(slug) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS rental_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price REAL NOT NULL DEFAULT 0,
        category_id INTEGER REFERENCES categories(id),
        image_url TEXT NOT NULL DEFAULT '',
        featured BOOLEAN NOT NULL DEFAULT 0,
        available BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_rental_items_image_url ON rental_items(image_url)",
    r#"
    CREATE TABLE IF NOT EXISTS bookings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER NOT NULL REFERENCES clients(id),
        event_date TEXT NOT NULL,
        event_type TEXT NOT NULL DEFAULT 'other',
        event_location TEXT NOT NULL DEFAULT '',
        guest_count INTEGER NOT NULL DEFAULT 0,
        budget REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        message TEXT NOT NULL DEFAULT '',
        special_requests TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT 'fr',
        total_amount REAL NOT NULL DEFAULT 0,
        deposit_amount REAL NOT NULL DEFAULT 0,
        admin_notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bookings_event_date ON bookings(event_date)",
    "CREATE INDEX IF NOT EXISTS idx_bookings_client_id ON bookings(client_id)",
    r#"
    CREATE TABLE IF NOT EXISTS booking_rental_items (
        booking_id INTEGER NOT NULL REFERENCES bookings(id),
        rental_item_id INTEGER NOT NULL REFERENCES rental_items(id),
        PRIMARY KEY (booking_id, rental_item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS availabilities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        available BOOLEAN NOT NULL DEFAULT 1,
        max_events INTEGER NOT NULL DEFAULT 1,
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_availabilities_date ON availabilities(date) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS testimonials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER REFERENCES clients(id),
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        rating INTEGER NOT NULL DEFAULT 5,
        event_type TEXT,
        approved BOOLEAN NOT NULL DEFAULT 0,
        featured BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS newsletters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        active BOOLEAN NOT NULL DEFAULT 1,
        language TEXT NOT NULL DEFAULT 'fr',
        unsub_token TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_newsletters_email ON newsletters(email) WHERE deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_newsletters_unsub_token ON newsletters(unsub_token)",
    r#"
    CREATE TABLE IF NOT EXISTS gallery_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        image_url TEXT NOT NULL,
        thumbnail_url TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL,
        file_name TEXT NOT NULL DEFAULT '',
        is_from_storage BOOLEAN NOT NULL DEFAULT 0,
        featured BOOLEAN NOT NULL DEFAULT 0,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_gallery_images_image_url ON gallery_images(image_url)",
    r#"
    CREATE TABLE IF NOT EXISTS site_contents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT 'fr',
        section TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_site_contents_key_lang ON site_contents(key, language) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS email_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipient TEXT NOT NULL,
        subject TEXT NOT NULL,
        type TEXT NOT NULL,
        body TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        next_attempt_at INTEGER NOT NULL DEFAULT 0,
        error TEXT,
        client_id INTEGER REFERENCES clients(id),
        sent_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_email_logs_due ON email_logs(status, next_attempt_at)",
];
