use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};
use sqlx::SqliteExecutor;

use super::models::Newsletter;
use super::{soft_delete, unique_violation, StoreError, StoreResult};

const COLUMNS: &str = "id, email, name, active, language, unsub_token, created_at, updated_at";

const TOKEN_LEN: usize = 32;

pub fn generate_unsub_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LEN)
}

pub async fn insert<'e, E>(ex: E, email: &str, name: &str, language: &str) -> StoreResult<Newsletter>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO newsletters (email, name, active, language, unsub_token, created_at, updated_at)
         VALUES (?, ?, 1, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Newsletter>(&sql)
        .bind(email)
        .bind(name)
        .bind(language)
        .bind(generate_unsub_token())
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await
        .map_err(unique_violation("Subscriber", email))
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<Newsletter>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM newsletters WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, Newsletter>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Subscriber"))
}

pub async fn find_by_email<'e, E>(ex: E, email: &str) -> StoreResult<Option<Newsletter>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM newsletters WHERE email = ? AND deleted_at IS NULL");
    Ok(sqlx::query_as::<_, Newsletter>(&sql)
        .bind(email)
        .fetch_optional(ex)
        .await?)
}

pub async fn list<'e, E>(ex: E, active: Option<bool>) -> StoreResult<Vec<Newsletter>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM newsletters
         WHERE deleted_at IS NULL AND (?1 IS NULL OR active = ?1)
         ORDER BY created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Newsletter>(&sql)
        .bind(active)
        .fetch_all(ex)
        .await?)
}

pub async fn update<'e, E>(ex: E, subscriber: &Newsletter) -> StoreResult<Newsletter>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE newsletters SET email = ?, name = ?, active = ?, language = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Newsletter>(&sql)
        .bind(&subscriber.email)
        .bind(&subscriber.name)
        .bind(subscriber.active)
        .bind(&subscriber.language)
        .bind(Utc::now())
        .bind(subscriber.id)
        .fetch_optional(ex)
        .await
        .map_err(unique_violation("Subscriber", subscriber.email.as_str()))?
        .ok_or(StoreError::not_found("Subscriber"))
}

/// Deactivates the subscription owning `token`. Unknown tokens are `NotFound`.
pub async fn unsubscribe<'e, E>(ex: E, token: &str) -> StoreResult<Newsletter>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE newsletters SET active = 0, updated_at = ?
         WHERE unsub_token = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Newsletter>(&sql)
        .bind(Utc::now())
        .bind(token)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Subscription"))
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "newsletters", "Subscriber", id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsub_tokens_are_long_and_distinct() {
        let a = generate_unsub_token();
        let b = generate_unsub_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
