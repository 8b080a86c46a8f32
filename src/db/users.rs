use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::User;
use super::{unique_violation, StoreError, StoreResult};

const COLUMNS: &str = "id, email, password_hash, name, role, created_at, updated_at";

pub async fn insert<'e, E>(
    ex: E,
    email: &str,
    password_hash: &str,
    name: &str,
    role: &str,
) -> StoreResult<User>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO users (email, password_hash, name, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(name)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await
        .map_err(unique_violation("User", email))
}

pub async fn find_by_email<'e, E>(ex: E, email: &str) -> StoreResult<Option<User>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM users WHERE email = ? AND deleted_at IS NULL"
    );
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(ex)
        .await?)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<User>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("User"))
}

pub async fn update_password<'e, E>(ex: E, id: i64, password_hash: &str) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(password_hash)
    .bind(Utc::now())
    .bind(id)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("User"));
    }
    Ok(())
}
