//! User account types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vetclinic_core::{Email, UserId, UserRole};

/// A clinic account (client or staff).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
