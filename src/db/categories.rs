use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::{Category, CategoryKind};
use super::{soft_delete, unique_violation, StoreError, StoreResult};

const COLUMNS: &str = "id, name, slug, description, type, created_at, updated_at";

pub async fn insert<'e, E>(
    ex: E,
    name: &str,
    slug: &str,
    description: &str,
    kind: CategoryKind,
) -> StoreResult<Category>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO categories (name, slug, description, type, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Category>(&sql)
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(kind)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await
        .map_err(unique_violation("Category", slug))
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<Category>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM categories WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, Category>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Category"))
}

pub async fn find_by_slug<'e, E>(ex: E, slug: &str) -> StoreResult<Option<Category>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM categories WHERE slug = ? AND deleted_at IS NULL");
    Ok(sqlx::query_as::<_, Category>(&sql)
        .bind(slug)
        .fetch_optional(ex)
        .await?)
}

/// Alphabetical by name.
pub async fn list<'e, E>(ex: E, kind: Option<CategoryKind>) -> StoreResult<Vec<Category>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM categories
         WHERE deleted_at IS NULL AND (?1 IS NULL OR type = ?1)
         ORDER BY name ASC, id ASC"
    );
    Ok(sqlx::query_as::<_, Category>(&sql)
        .bind(kind)
        .fetch_all(ex)
        .await?)
}

pub async fn update<'e, E>(ex: E, category: &Category) -> StoreResult<Category>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE categories SET name = ?, slug = ?, description = ?, type = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Category>(&sql)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.kind)
        .bind(Utc::now())
        .bind(category.id)
        .fetch_optional(ex)
        .await
        .map_err(unique_violation("Category", category.slug.as_str()))?
        .ok_or(StoreError::not_found("Category"))
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "categories", "Category", id).await
}
