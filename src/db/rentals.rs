use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use super::models::{NewRentalItem, RentalItem, RentalItemRow};
use super::{soft_delete, StoreError, StoreResult};

/// Rental columns with the live category joined in as `c`.
const SELECT: &str = "SELECT r.id, r.title, r.description, r.price, r.category_id, \
     c.name AS category_name, c.slug AS category_slug, r.image_url, r.featured, r.available, \
     r.created_at, r.updated_at \
     FROM rental_items r \
     LEFT JOIN categories c ON c.id = r.category_id AND c.deleted_at IS NULL";

#[derive(Debug, Default, Clone)]
pub struct RentalFilter {
    pub category_slug: Option<String>,
    pub category_id: Option<i64>,
    pub featured: Option<bool>,
    pub available: Option<bool>,
}

pub async fn insert<'e, E>(ex: E, item: &NewRentalItem) -> StoreResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO rental_items (title, description, price, category_id, image_url, featured,
             available, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(item.price)
    .bind(item.category_id)
    .bind(&item.image_url)
    .bind(item.featured)
    .bind(item.available)
    .bind(now)
    .bind(now)
    .fetch_one(ex)
    .await?;
    Ok(id)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<RentalItem>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("{SELECT} WHERE r.id = ? AND r.deleted_at IS NULL");
    sqlx::query_as::<_, RentalItemRow>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .map(RentalItem::from)
        .ok_or(StoreError::not_found("Rental item"))
}

/// Newest first.
pub async fn list<'e, E>(ex: E, filter: &RentalFilter) -> StoreResult<Vec<RentalItem>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{SELECT}
         WHERE r.deleted_at IS NULL
           AND (?1 IS NULL OR c.slug = ?1)
           AND (?2 IS NULL OR r.category_id = ?2)
           AND (?3 IS NULL OR r.featured = ?3)
           AND (?4 IS NULL OR r.available = ?4)
         ORDER BY r.created_at DESC, r.id DESC"
    );
    let rows = sqlx::query_as::<_, RentalItemRow>(&sql)
        .bind(filter.category_slug.as_deref())
        .bind(filter.category_id)
        .bind(filter.featured)
        .bind(filter.available)
        .fetch_all(ex)
        .await?;
    Ok(rows.into_iter().map(RentalItem::from).collect())
}

pub async fn list_for_booking<'e, E>(ex: E, booking_id: i64) -> StoreResult<Vec<RentalItem>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "{SELECT}
         JOIN booking_rental_items b ON b.rental_item_id = r.id
         WHERE b.booking_id = ?
         ORDER BY r.id ASC"
    );
    let rows = sqlx::query_as::<_, RentalItemRow>(&sql)
        .bind(booking_id)
        .fetch_all(ex)
        .await?;
    Ok(rows.into_iter().map(RentalItem::from).collect())
}

pub async fn update<'e, E>(ex: E, item: &RentalItem) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE rental_items SET title = ?, description = ?, price = ?, category_id = ?,
             image_url = ?, featured = ?, available = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(item.price)
    .bind(item.category_id)
    .bind(&item.image_url)
    .bind(item.featured)
    .bind(item.available)
    .bind(Utc::now())
    .bind(item.id)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("Rental item"));
    }
    Ok(())
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "rental_items", "Rental item", id).await
}

/// Whether any row, deleted or not, already points at one of `urls`.
pub async fn url_known<'e, E>(ex: E, urls: &[&str]) -> StoreResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM rental_items WHERE image_url IN (");
    let mut list = qb.separated(", ");
    for url in urls {
        list.push_bind(url.to_string());
    }
    list.push_unseparated(")");

    let (count,): (i64,) = qb.build_query_as().fetch_one(ex).await?;
    Ok(count > 0)
}
