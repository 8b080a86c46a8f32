use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::{NewTestimonial, Testimonial};
use super::{soft_delete, StoreError, StoreResult};

const COLUMNS: &str =
    "id, client_id, name, content, rating, event_type, approved, featured, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct TestimonialFilter {
    pub approved: Option<bool>,
    pub featured: Option<bool>,
}

pub async fn insert<'e, E>(ex: E, testimonial: &NewTestimonial) -> StoreResult<Testimonial>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO testimonials (client_id, name, content, rating, event_type, approved,
             featured, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, Testimonial>(&sql)
        .bind(testimonial.client_id)
        .bind(&testimonial.name)
        .bind(&testimonial.content)
        .bind(testimonial.rating)
        .bind(testimonial.event_type)
        .bind(testimonial.approved)
        .bind(testimonial.featured)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await?)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<Testimonial>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM testimonials WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, Testimonial>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Testimonial"))
}

/// Featured first, then newest.
pub async fn list<'e, E>(ex: E, filter: &TestimonialFilter) -> StoreResult<Vec<Testimonial>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM testimonials
         WHERE deleted_at IS NULL
           AND (?1 IS NULL OR approved = ?1)
           AND (?2 IS NULL OR featured = ?2)
         ORDER BY featured DESC, created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, Testimonial>(&sql)
        .bind(filter.approved)
        .bind(filter.featured)
        .fetch_all(ex)
        .await?)
}

pub async fn update<'e, E>(ex: E, testimonial: &Testimonial) -> StoreResult<Testimonial>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE testimonials SET name = ?, content = ?, rating = ?, event_type = ?,
             approved = ?, featured = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Testimonial>(&sql)
        .bind(&testimonial.name)
        .bind(&testimonial.content)
        .bind(testimonial.rating)
        .bind(testimonial.event_type)
        .bind(testimonial.approved)
        .bind(testimonial.featured)
        .bind(Utc::now())
        .bind(testimonial.id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Testimonial"))
}

pub async fn delete<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    soft_delete(ex, "testimonials", "Testimonial", id).await
}
