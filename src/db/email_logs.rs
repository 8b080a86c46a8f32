//! Outbox persistence. Every email is stored before it is sent and the row
//! tracks each delivery attempt.

use chrono::Utc;
use sqlx::SqliteExecutor;

use super::models::{EmailKind, EmailLog, EmailStatus, NewEmail};
use super::{StoreError, StoreResult};

const COLUMNS: &str = "id, recipient, subject, type, body, status, attempts, next_attempt_at, \
     error, client_id, sent_at, created_at, updated_at";

/// Rows that have failed this many times are left alone.
pub const MAX_ATTEMPTS: i64 = 5;

#[derive(Debug, Default, Clone)]
pub struct EmailLogFilter {
    pub status: Option<EmailStatus>,
    pub kind: Option<EmailKind>,
}

pub async fn insert<'e, E>(ex: E, email: &NewEmail) -> StoreResult<EmailLog>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO email_logs (recipient, subject, type, body, status, attempts,
             next_attempt_at, client_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, EmailLog>(&sql)
        .bind(&email.to)
        .bind(&email.subject)
        .bind(email.kind)
        .bind(&email.body)
        .bind(EmailStatus::Pending)
        .bind(now.timestamp())
        .bind(email.client_id)
        .bind(now)
        .bind(now)
        .fetch_one(ex)
        .await?)
}

pub async fn get<'e, E>(ex: E, id: i64) -> StoreResult<EmailLog>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM email_logs WHERE id = ? AND deleted_at IS NULL");
    sqlx::query_as::<_, EmailLog>(&sql)
        .bind(id)
        .fetch_optional(ex)
        .await?
        .ok_or(StoreError::not_found("Email log"))
}

/// Newest first.
pub async fn list<'e, E>(ex: E, filter: &EmailLogFilter) -> StoreResult<Vec<EmailLog>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM email_logs
         WHERE deleted_at IS NULL
           AND (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR type = ?2)
         ORDER BY created_at DESC, id DESC"
    );
    Ok(sqlx::query_as::<_, EmailLog>(&sql)
        .bind(filter.status)
        .bind(filter.kind)
        .fetch_all(ex)
        .await?)
}

/// Moves a deliverable row to `sending`. Returns `None` when another sender
/// already holds it, it was sent, or it ran out of attempts.
pub async fn claim<'e, E>(ex: E, id: i64) -> StoreResult<Option<EmailLog>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE email_logs SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND deleted_at IS NULL
           AND status IN (?4, ?5) AND attempts < ?6
         RETURNING {COLUMNS}"
    );
    Ok(sqlx::query_as::<_, EmailLog>(&sql)
        .bind(EmailStatus::Sending)
        .bind(Utc::now())
        .bind(id)
        .bind(EmailStatus::Pending)
        .bind(EmailStatus::Failed)
        .bind(MAX_ATTEMPTS)
        .fetch_optional(ex)
        .await?)
}

pub async fn mark_sent<'e, E>(ex: E, id: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    sqlx::query(
        "UPDATE email_logs SET status = ?, attempts = attempts + 1, error = NULL,
             sent_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(EmailStatus::Sent)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn mark_failed<'e, E>(ex: E, id: i64, error: &str, next_attempt_at: i64) -> StoreResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "UPDATE email_logs SET status = ?, attempts = attempts + 1, error = ?,
             next_attempt_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(EmailStatus::Failed)
    .bind(error)
    .bind(next_attempt_at)
    .bind(Utc::now())
    .bind(id)
    .execute(ex)
    .await?;
    Ok(())
}

/// Ids of rows ready for another attempt at `now` (epoch seconds), oldest first.
pub async fn due_ids<'e, E>(ex: E, now: i64, limit: i64) -> StoreResult<Vec<i64>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM email_logs
         WHERE deleted_at IS NULL AND status IN (?, ?) AND attempts < ? AND next_attempt_at <= ?
         ORDER BY next_attempt_at ASC, id ASC
         LIMIT ?",
    )
    .bind(EmailStatus::Pending)
    .bind(EmailStatus::Failed)
    .bind(MAX_ATTEMPTS)
    .bind(now)
    .bind(limit)
    .fetch_all(ex)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Puts rows left in `sending` by a previous process back in the queue.
pub async fn reset_sending<'e, E>(ex: E) -> StoreResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE email_logs SET status = ?, updated_at = ? WHERE status = ? AND deleted_at IS NULL",
    )
    .bind(EmailStatus::Pending)
    .bind(Utc::now())
    .bind(EmailStatus::Sending)
    .execute(ex)
    .await?;
    Ok(result.rows_affected())
}
