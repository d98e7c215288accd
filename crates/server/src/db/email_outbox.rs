//! Outbound email queue.
//!
//! Workflows enqueue rendered emails inside their own transaction; the
//! dispatcher claims due rows with `FOR UPDATE SKIP LOCKED` so several
//! server instances can drain the queue without sending twice.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

/// A queued email.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxEmail {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attempts: i32,
}

/// A rendered email ready to queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Queue an email inside the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn enqueue(conn: &mut PgConnection, email: &RenderedEmail) -> Result<i64, RepositoryError> {
    let id = sqlx::query_scalar::<_, i64>(
        r"
        INSERT INTO clinic.email_outbox (recipient, subject, text_body, html_body)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(&email.recipient)
    .bind(&email.subject)
    .bind(&email.text_body)
    .bind(&email.html_body)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub struct EmailOutboxRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailOutboxRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Queue an email outside any workflow transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn enqueue(&self, email: &RenderedEmail) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        enqueue(&mut conn, email).await
    }

    /// Number of rows still waiting to be sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clinic.email_outbox WHERE sent_at IS NULL AND failed_at IS NULL",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

/// Claim up to `limit` due rows. Rows stay locked until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn claim_due(
    conn: &mut PgConnection,
    limit: i64,
) -> Result<Vec<OutboxEmail>, RepositoryError> {
    let rows = sqlx::query_as::<_, OutboxEmail>(
        r"
        SELECT id, recipient, subject, text_body, html_body, attempts
        FROM clinic.email_outbox
        WHERE sent_at IS NULL AND failed_at IS NULL AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at, id
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        ",
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_sent(conn: &mut PgConnection, id: i64) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.email_outbox
        SET sent_at = NOW(), attempts = attempts + 1, last_error = NULL
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record a failed attempt; `retry_at = None` gives up on the row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_attempt_failed(
    conn: &mut PgConnection,
    id: i64,
    error: &str,
    retry_at: Option<DateTime<Utc>>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.email_outbox
        SET attempts = attempts + 1,
            last_error = $2,
            next_attempt_at = COALESCE($3, next_attempt_at),
            failed_at = CASE WHEN $3 IS NULL THEN NOW() END
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(error)
    .bind(retry_at)
    .execute(conn)
    .await?;
    Ok(())
}
