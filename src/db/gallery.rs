use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use super::models::{GalleryCategory, GalleryImage, NewGalleryImage};
use super::{soft_delete, StoreError, StoreResult};

const COLUMNS: &str = "id, title, description, image_url, thumbnail_url, category, file_name, \
     is_from_storage, featured, sort_order, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct GalleryFilter {
    pub category: Option<GalleryCategory>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: GalleryCategory,
    pub count: i64,
}

pub async fn insert<'e, E>(ex: E, image: &NewGalleryImage) -> StoreResult<GalleryImage>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO gallery_images (title, description, image_url, thumbnail_url, category,
             file_name, is_from_storage, featured, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, GalleryImage>(&sql)
        .bind(&image.title)
        .bind(&image.description)
        .bind(&image.image_url)
        .bind(image.category)
        .bind(&image.file_name)
        .bind(image.is_from_storage)
        .bind(image.featured)
        .bind(image.sort_order)
        .bind(now)
        .fetch_one(ex)
        .await?)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<GalleryImage>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM gallery_images WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, GalleryImage>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Image"))
}

/// Ordered by `sort_order`, then newest first.
pub async fn list<'e, E>(ex: E, filter: &GalleryFilter) -> StoreResult<Vec<GalleryImage>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM gallery_images
         WHERE deleted_at IS NULL
           AND (?1 IS NULL OR category = ?1)
           AND (?2 IS NULL OR featured = ?2)
         ORDER BY sort_order ASC, created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, GalleryImage>(&sql)
        .bind(filter.category)
        .bind(filter.featured)
        .fetch_all(ex)
        .await?)
}

pub async fn random<'e, E>(
    ex: E,
    category: Option<GalleryCategory>,
    limit: i64,
    exclude: &[i64],
) -> StoreResult<Vec<GalleryImage>>
where
    E: SqliteExecutor<'e>,
{
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {COLUMNS} FROM gallery_images WHERE deleted_at IS NULL"
    ));
    if let Some(category) = category {
        qb.push(" AND category = ").push_bind(category);
    }
    if !exclude.is_empty() {
        qb.push(" AND id NOT IN (");
        let mut ids = qb.separated(", ");
        for id in exclude {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }
    qb.push(" ORDER BY RANDOM() LIMIT ").push_bind(limit);

    Ok(qb.build_query_as::<GalleryImage>().fetch_all(ex).await?)
}

pub async fn update<'e, E>(ex: E, image: &GalleryImage) -> StoreResult<GalleryImage>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE gallery_images SET title = ?, description = ?, image_url = ?, thumbnail_url = ?,
             category = ?, featured = ?, sort_order = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, GalleryImage>(&sql)
        .bind(&image.title)
        .bind(&image.description)
        .bind(&image.image_url)
        .bind(&image.thumbnail_url)
        .bind(image.category)
        .bind(image.featured)
        .bind(image.sort_order)
        .bind(Utc::now())
        .bind(image.id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Image"))
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "gallery_images", "Image", id).await
}

/// Whether any row, deleted or not, already points at one of `urls`.
pub async fn url_known<'e, E>(ex: E, urls: &[&str]) -> StoreResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM gallery_images WHERE image_url IN (");
    let mut list = qb.separated(", ");
    for url in urls {
        list.push_bind(url.to_string());
    }
    list.push_unseparated(")");

    let (count,): (i64,) = qb.build_query_as().fetch_one(ex).await?;
    Ok(count > 0)
}

/// Live image count for every gallery category, zero included.
pub async fn category_counts<'e, E>(ex: E) -> StoreResult<Vec<CategoryCount>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<(GalleryCategory, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) FROM gallery_images
         WHERE deleted_at IS NULL GROUP BY category",
    )
    .fetch_all(ex)
    .await?;

    Ok(GalleryCategory::ALL
        .iter()
        .map(|category| CategoryCount {
            category: *category,
            count: rows
                .iter()
                .find(|(c, _)| c == category)
                .map(|(_, n)| *n)
                .unwrap_or(0),
        })
        .collect())
}
