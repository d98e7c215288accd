//! Notification repository.

use sqlx::{PgConnection, PgPool};

use vetclinic_core::{NotificationId, UserId};

use super::RepositoryError;
use crate::models::Notification;

pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r"
            SELECT id, user_id, title, message, kind, is_read, created_at
            FROM clinic.notification
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user)
        .bind(unread_only)
        .fetch_all(self.pool)
        .await?;
        Ok(notifications)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` unless `user` owns the notification.
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE clinic.notification SET is_read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Returns the number of notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE clinic.notification SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` unless `user` owns the notification.
    pub async fn delete(&self, user: UserId, id: NotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM clinic.notification WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Insert a notification as part of a larger workflow.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    user: UserId,
    title: &str,
    message: &str,
    kind: &str,
) -> Result<Notification, RepositoryError> {
    let notification = sqlx::query_as::<_, Notification>(
        r"
        INSERT INTO clinic.notification (user_id, title, message, kind)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, title, message, kind, is_read, created_at
        ",
    )
    .bind(user)
    .bind(title)
    .bind(message)
    .bind(kind)
    .fetch_one(conn)
    .await?;
    Ok(notification)
}
