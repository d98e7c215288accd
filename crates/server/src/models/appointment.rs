//! Appointments, including boarding stays and their paperwork.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vetclinic_core::{AppointmentId, AppointmentStatus, CageId, PetId, ServiceId, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: AppointmentId,
    pub user_id: UserId,
    pub pet_id: PetId,
    pub service_id: ServiceId,
    pub cage_id: Option<CageId>,
    pub appointment_date: NaiveDate,
    pub appointment_time: Option<NaiveTime>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub status: AppointmentStatus,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub receipt_verified: bool,
    pub receipt_verified_at: Option<DateTime<Utc>>,
    pub receipt_verified_by: Option<UserId>,
    pub boarding_id_url: Option<String>,
    pub boarding_id_verified: Option<bool>,
    pub boarding_id_verified_at: Option<DateTime<Utc>>,
    pub boarding_id_rejection_reason: Option<String>,
    pub boarding_signature_url: Option<String>,
    pub boarding_signature_verified: Option<bool>,
    pub boarding_signature_verified_at: Option<DateTime<Utc>>,
    pub boarding_signature_rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment joined with the names a listing needs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: Appointment,
    pub owner_name: String,
    pub owner_email: String,
    pub pet_name: String,
    pub service_name: String,
    pub cage_number: Option<String>,
}
