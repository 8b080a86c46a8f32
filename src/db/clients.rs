use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::{Client, NewClient};
use super::{soft_delete, unique_violation, StoreError, StoreResult};

const COLUMNS: &str = "id, name, email, phone, notes, created_at, updated_at";

pub async fn insert<'e, E>(ex: E, client: &NewClient) -> StoreResult<Client>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO clients (name, email, phone, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Client>(&sql)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.notes)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await
        .map_err(unique_violation("Client", client.email.as_str()))
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<Client>
where
    E: SqliteExecutor<'e>,
{
    find(ex, id).await?.ok_or(StoreError::not_found("Client"))
}

pub async fn find<'e, E>(ex: E, id: i64) -> StoreResult<Option<Client>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM clients WHERE id = ? AND deleted_at IS NULL");
    Ok(sqlx::query_as::<_, Client>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?)
}

pub async fn find_by_email<'e, E>(ex: E, email: &str) -> StoreResult<Option<Client>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM clients WHERE email = ? AND deleted_at IS NULL");
    Ok(sqlx::query_as::<_, Client>(&sql)
        .bind(email)
        .fetch_optional(ex)
        .await?)
}

/// Newest first; `search` is a case-insensitive substring of name or email.
pub async fn list<'e, E>(ex: E, search: Option<&str>) -> StoreResult<Vec<Client>>
where
    E: SqliteExecutor<'e>,
{
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let sql = format!(
        "SELECT {COLUMNS} FROM clients
         WHERE deleted_at IS NULL
           AND (?1 IS NULL OR LOWER(name) LIKE ?1 OR LOWER(email) LIKE ?1)
         ORDER BY created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Client>(&sql)
        .bind(pattern)
        .fetch_all(ex)
        .await?)
}

pub async fn update<'e, E>(ex: E, client: &Client) -> StoreResult<Client>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE clients SET name = ?, email = ?, phone = ?, notes = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Client>(&sql)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.notes)
        .bind(Utc::now())
        .bind(client.id)
        .fetch_optional(ex)
        .await
        .map_err(unique_violation("Client", client.email.as_str()))?
        .ok_or(StoreError::not_found("Client"))
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "clients", "Client", id).await
}
