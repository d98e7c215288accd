//! Notifications raised by workflows.
//!
//! A notice always becomes an in-app notification. When asked, it is also
//! rendered as an email and queued in the outbox on the same connection, so
//! both land or neither does. Rendering problems are logged and never fail
//! the workflow.

use sqlx::PgConnection;
use tracing::warn;

use vetclinic_core::UserId;

use crate::db::RepositoryError;
use crate::db::{email_outbox, notifications, users};
use crate::services::email::render_notification;

/// Title, body and kind of a notification.
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub kind: &'a str,
}

/// Whether a notice is also emailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    InApp,
    InAppAndEmail,
}

/// Notify one user.
///
/// # Errors
///
/// Returns `RepositoryError` if the notification or outbox insert fails.
pub async fn notify_user(
    conn: &mut PgConnection,
    user: UserId,
    notice: Notice<'_>,
    delivery: Delivery,
    base_url: &str,
) -> Result<(), RepositoryError> {
    notifications::insert(conn, user, notice.title, notice.message, notice.kind).await?;

    if delivery == Delivery::InAppAndEmail {
        let (email, name) = users::contact(conn, user).await?;
        match render_notification(&email, &name, notice.title, notice.message, base_url) {
            Ok(rendered) => {
                email_outbox::enqueue(conn, &rendered).await?;
            }
            Err(e) => warn!(user_id = %user, error = %e, "Failed to render notification email"),
        }
    }
    Ok(())
}

/// Notify every admin in-app.
///
/// # Errors
///
/// Returns `RepositoryError` if a notification insert fails.
pub async fn notify_admins(conn: &mut PgConnection, notice: Notice<'_>) -> Result<usize, RepositoryError> {
    let admins = users::admin_ids(conn).await?;
    for admin in &admins {
        notifications::insert(conn, *admin, notice.title, notice.message, notice.kind).await?;
    }
    Ok(admins.len())
}
