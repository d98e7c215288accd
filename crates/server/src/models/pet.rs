//! Pet records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vetclinic_core::{PetId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Pet {
    pub id: PetId,
    pub owner_id: UserId,
    /// Owner display name, joined for staff listings.
    pub owner_name: Option<String>,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight_kg: Option<Decimal>,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
