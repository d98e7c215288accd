//! Background delivery of queued emails.
//!
//! The dispatcher runs on its own tokio task. Each tick it claims a batch of
//! due rows inside a transaction, sends them, and records the outcome before
//! committing. A failed send is retried with exponential backoff until
//! [`MAX_ATTEMPTS`] is reached, after which the row is marked failed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use crate::db::RepositoryError;
use crate::db::email_outbox::{self, OutboxEmail};
use crate::services::email::EmailService;

/// Rows claimed per tick.
pub const BATCH_SIZE: i64 = 20;

/// Attempts before a row is given up on.
pub const MAX_ATTEMPTS: i32 = 5;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const BASE_BACKOFF_SECS: i64 = 30;

/// When to retry after the `attempts`-th failure, or `None` to give up.
#[must_use]
pub fn next_attempt_after(attempts: i32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if attempts >= MAX_ATTEMPTS {
        return None;
    }
    let exponent = u32::try_from(attempts.max(1) - 1).unwrap_or(0);
    let delay = BASE_BACKOFF_SECS.saturating_mul(2_i64.saturating_pow(exponent));
    Some(now + chrono::Duration::seconds(delay))
}

/// Spawn the dispatcher loop.
pub fn spawn_dispatcher(pool: PgPool, mailer: EmailService) {
    info!("Spawning email outbox dispatcher");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match dispatch_batch(&pool, &mailer).await {
                Ok(0) => {}
                Ok(sent) => info!(sent, "Delivered queued emails"),
                Err(e) => error!(error = %e, "Email outbox dispatch failed"),
            }
        }
    });
}

/// Deliver one batch of due emails. Returns how many were sent.
///
/// # Errors
///
/// Returns `RepositoryError` if claiming or updating rows fails.
#[instrument(skip_all)]
pub async fn dispatch_batch(pool: &PgPool, mailer: &EmailService) -> Result<usize, RepositoryError> {
    let mut tx = pool.begin().await?;
    let batch = email_outbox::claim_due(&mut tx, BATCH_SIZE).await?;

    let mut sent = 0;
    for email in &batch {
        match deliver(mailer, email).await {
            Ok(()) => {
                email_outbox::mark_sent(&mut tx, email.id).await?;
                sent += 1;
            }
            Err(message) => {
                let attempts = email.attempts + 1;
                let retry_at = next_attempt_after(attempts, Utc::now());
                if retry_at.is_none() {
                    warn!(email_id = email.id, attempts, error = %message, "Giving up on email");
                }
                email_outbox::mark_attempt_failed(&mut tx, email.id, &message, retry_at).await?;
            }
        }
    }

    tx.commit().await?;
    Ok(sent)
}

async fn deliver(mailer: &EmailService, email: &OutboxEmail) -> Result<(), String> {
    mailer
        .send_multipart_email(
            &email.recipient,
            &email.subject,
            &email.text_body,
            &email.html_body,
        )
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let now = Utc::now();
        let delays: Vec<i64> = (1..MAX_ATTEMPTS)
            .map(|n| (next_attempt_after(n, now).unwrap() - now).num_seconds())
            .collect();
        assert_eq!(delays, vec![30, 60, 120, 240]);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        assert!(next_attempt_after(MAX_ATTEMPTS, Utc::now()).is_none());
        assert!(next_attempt_after(MAX_ATTEMPTS + 3, Utc::now()).is_none());
    }
}
