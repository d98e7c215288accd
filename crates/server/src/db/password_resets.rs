//! Password reset token storage.
//!
//! Only the SHA-256 hex digest of a token is stored. Each user has at most
//! one row; issuing a new token overwrites the previous one.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use vetclinic_core::{TokenState, UserId};

use super::RepositoryError;

/// Stored token metadata.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredResetToken {
    pub user_id: UserId,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
}

impl StoredResetToken {
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        TokenState::evaluate(self.used, self.expires_at, now)
    }
}

pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a fresh token for `user`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        user: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO clinic.password_reset (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                used = FALSE,
                created_at = NOW()
            ",
        )
        .bind(user)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, token_hash: &str) -> Result<Option<StoredResetToken>, RepositoryError> {
        let token = sqlx::query_as::<_, StoredResetToken>(
            "SELECT user_id, used, expires_at FROM clinic.password_reset WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(token)
    }
}

/// Atomically mark a live token used and return its owner.
///
/// Returns `None` when the token is unknown, used, or expired; of two
/// concurrent claims exactly one sees the row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn claim(
    conn: &mut PgConnection,
    token_hash: &str,
) -> Result<Option<UserId>, RepositoryError> {
    let user = sqlx::query_scalar::<_, UserId>(
        r"
        UPDATE clinic.password_reset
        SET used = TRUE
        WHERE token_hash = $1 AND used = FALSE AND expires_at > NOW()
        RETURNING user_id
        ",
    )
    .bind(token_hash)
    .fetch_optional(conn)
    .await?;
    Ok(user)
}
