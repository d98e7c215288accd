//! Boarding cages and their reservations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vetclinic_core::{
    AppointmentId, CageId, CageStatus, CageType, PetId, ReservationId, ReservationStatus,
    StayRange,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cage {
    pub id: CageId,
    pub cage_number: String,
    pub cage_type: CageType,
    pub capacity: i32,
    pub daily_rate: Decimal,
    pub status: CageStatus,
    pub current_pet_id: Option<PetId>,
    pub current_appointment_id: Option<AppointmentId>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cage as shown in the unfiltered listing: who is in it now and when it
/// is next booked.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CageListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub cage: Cage,
    pub current_pet_name: Option<String>,
    pub next_check_in: Option<NaiveDate>,
    pub next_check_out: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CageReservation {
    pub id: ReservationId,
    pub cage_id: CageId,
    pub appointment_id: AppointmentId,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CageReservation {
    /// The reserved stay. Rows are constrained to `check_out >= check_in`.
    #[must_use]
    pub fn stay(&self) -> Option<StayRange> {
        StayRange::new(self.check_in_date, self.check_out_date).ok()
    }
}
