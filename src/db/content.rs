use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::SiteContent;
use super::StoreResult;

const COLUMNS: &str = "id, key, value, language, section, created_at, updated_at";

pub async fn list<'e, E>(ex: E, section: Option<&str>, language: &str) -> StoreResult<Vec<SiteContent>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM site_contents
         WHERE deleted_at IS NULL AND language = ?1 AND (?2 IS NULL OR section = ?2)
         ORDER BY section ASC, key ASC"
    );
    Ok(sqlx::query_as::<_, SiteContent>(&sql)
        .bind(language)
        .bind(section)
        .fetch_all(ex)
        .await?)
}

/// Writes the value for `(key, language)`, creating the row on first use.
pub async fn upsert<'e, E>(
    ex: E,
    key: &str,
    value: &str,
    language: &str,
    section: &str,
) -> StoreResult<SiteContent>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO site_contents (key, value, language, section, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (key, language) WHERE deleted_at IS NULL DO UPDATE SET
             value = excluded.value,
             section = CASE WHEN excluded.section = '' THEN site_contents.section
                            ELSE excluded.section END,
             updated_at = excluded.updated_at
         RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, SiteContent>(&sql)
        .bind(key)
        .bind(value)
        .bind(language)
        .bind(section)
        .bind(now)
        .fetch_one(ex)
        .await?)
}
