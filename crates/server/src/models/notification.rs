//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vetclinic_core::{NotificationId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification kinds written by the workflows.
pub mod kinds {
    pub const GENERAL: &str = "general";
    pub const PAYMENT: &str = "payment";
    pub const DOCUMENTS: &str = "documents";
    pub const APPOINTMENT: &str = "appointment";
    pub const ORDER: &str = "order";
}
