//! Appointment repository.
//!
//! Reads go through the pool; every state change takes a `&mut PgConnection`
//! because it is one step of a larger workflow (booking, receipt review,
//! document review, check-in) that commits as a unit.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use vetclinic_core::{
    AppointmentId, AppointmentStatus, BoardingDocument, CageId, PetId, ServiceId, StayRange,
    UserId,
};

use super::RepositoryError;
use crate::models::{Appointment, AppointmentDetail};

const APPOINTMENT_COLUMNS: &str = r"
    a.id, a.user_id, a.pet_id, a.service_id, a.cage_id, a.appointment_date,
    a.appointment_time, a.check_in_date, a.check_out_date, a.status, a.total_amount,
    a.notes, a.receipt_url, a.receipt_verified, a.receipt_verified_at, a.receipt_verified_by,
    a.boarding_id_url, a.boarding_id_verified, a.boarding_id_verified_at,
    a.boarding_id_rejection_reason, a.boarding_signature_url, a.boarding_signature_verified,
    a.boarding_signature_verified_at, a.boarding_signature_rejection_reason,
    a.created_at, a.updated_at
";

fn detail_select() -> String {
    format!(
        r"
        SELECT {APPOINTMENT_COLUMNS},
               u.name AS owner_name, u.email AS owner_email,
               p.name AS pet_name, s.name AS service_name, c.cage_number
        FROM clinic.appointment a
        JOIN clinic.user u ON u.id = a.user_id
        JOIN clinic.pet p ON p.id = a.pet_id
        JOIN clinic.service s ON s.id = a.service_id
        LEFT JOIN clinic.cage c ON c.id = a.cage_id
        WHERE TRUE"
    )
}

/// Listing filters. `owner` restricts to one client's appointments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentFilter {
    pub owner: Option<UserId>,
    pub status: Option<AppointmentStatus>,
}

/// A validated appointment to insert.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub user_id: UserId,
    pub pet_id: PetId,
    pub service_id: ServiceId,
    pub appointment_date: NaiveDate,
    pub appointment_time: Option<NaiveTime>,
    /// Cage and stay, for boarding services.
    pub boarding: Option<(CageId, StayRange)>,
    pub total_amount: Decimal,
    pub notes: Option<String>,
}

/// Repository for appointment reads.
pub struct AppointmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AppointmentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List appointments, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<AppointmentDetail>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(detail_select());
        if let Some(owner) = filter.owner {
            query.push(" AND a.user_id = ").push_bind(owner);
        }
        if let Some(status) = filter.status {
            query.push(" AND a.status = ").push_bind(status);
        }
        query.push(" ORDER BY a.appointment_date DESC, a.appointment_time DESC NULLS LAST, a.id DESC");

        Ok(query
            .build_query_as::<AppointmentDetail>()
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(
        &self,
        id: AppointmentId,
    ) -> Result<Option<AppointmentDetail>, RepositoryError> {
        let detail = sqlx::query_as::<_, AppointmentDetail>(&format!(
            "{} AND a.id = $1",
            detail_select()
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM clinic.appointment a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(appointment)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Lock an appointment row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: AppointmentId,
) -> Result<Option<Appointment>, RepositoryError> {
    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM clinic.appointment a WHERE a.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(appointment)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    new: &NewAppointment,
) -> Result<Appointment, RepositoryError> {
    let (cage, check_in, check_out) = match new.boarding {
        Some((cage, stay)) => (Some(cage), Some(stay.check_in()), Some(stay.check_out())),
        None => (None, None, None),
    };

    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        r"
        INSERT INTO clinic.appointment AS a
            (user_id, pet_id, service_id, cage_id, appointment_date, appointment_time,
             check_in_date, check_out_date, total_amount, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {APPOINTMENT_COLUMNS}
        "
    ))
    .bind(new.user_id)
    .bind(new.pet_id)
    .bind(new.service_id)
    .bind(cage)
    .bind(new.appointment_date)
    .bind(new.appointment_time)
    .bind(check_in)
    .bind(check_out)
    .bind(new.total_amount)
    .bind(new.notes.as_deref())
    .fetch_one(conn)
    .await?;
    Ok(appointment)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: AppointmentId,
    status: AppointmentStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE clinic.appointment SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Attach a new payment receipt. Any earlier verification is discarded.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn attach_receipt(
    conn: &mut PgConnection,
    id: AppointmentId,
    url: &str,
    status: AppointmentStatus,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.appointment
        SET receipt_url = $2, receipt_verified = FALSE,
            receipt_verified_at = NULL, receipt_verified_by = NULL,
            status = $3, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(url)
    .bind(status)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record a receipt review. Approval stamps the verifier; rejection clears
/// the stamp.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn record_receipt_review(
    conn: &mut PgConnection,
    id: AppointmentId,
    approved: bool,
    verifier: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.appointment
        SET receipt_verified = $2,
            receipt_verified_at = CASE WHEN $2 THEN NOW() END,
            receipt_verified_by = CASE WHEN $2 THEN $3 END,
            status = $4,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(approved)
    .bind(verifier)
    .bind(AppointmentStatus::after_receipt_review(approved))
    .execute(conn)
    .await?;
    Ok(())
}

/// Attach a boarding document, clearing any earlier verdict on it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn attach_document(
    conn: &mut PgConnection,
    id: AppointmentId,
    document: BoardingDocument,
    url: &str,
) -> Result<(), RepositoryError> {
    let sql = match document {
        BoardingDocument::Id => {
            r"
            UPDATE clinic.appointment
            SET boarding_id_url = $2, boarding_id_verified = NULL,
                boarding_id_verified_at = NULL, boarding_id_rejection_reason = NULL,
                updated_at = NOW()
            WHERE id = $1
            "
        }
        BoardingDocument::Signature => {
            r"
            UPDATE clinic.appointment
            SET boarding_signature_url = $2, boarding_signature_verified = NULL,
                boarding_signature_verified_at = NULL, boarding_signature_rejection_reason = NULL,
                updated_at = NOW()
            WHERE id = $1
            "
        }
    };
    sqlx::query(sql).bind(id).bind(url).execute(conn).await?;
    Ok(())
}

/// Record a verdict on one boarding document.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn record_document_review(
    conn: &mut PgConnection,
    id: AppointmentId,
    document: BoardingDocument,
    approved: bool,
    reason: Option<&str>,
) -> Result<(), RepositoryError> {
    let sql = match document {
        BoardingDocument::Id => {
            r"
            UPDATE clinic.appointment
            SET boarding_id_verified = $2, boarding_id_verified_at = NOW(),
                boarding_id_rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            "
        }
        BoardingDocument::Signature => {
            r"
            UPDATE clinic.appointment
            SET boarding_signature_verified = $2, boarding_signature_verified_at = NOW(),
                boarding_signature_rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            "
        }
    };
    sqlx::query(sql)
        .bind(id)
        .bind(approved)
        .bind(if approved { None } else { reason })
        .execute(conn)
        .await?;
    Ok(())
}

/// Reset both documents of a rejected appointment and return it to
/// `pending`.
///
/// The status guard is part of the `UPDATE`, so an appointment in any other
/// status is left untouched. Returns the owner when the reset happened.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn reset_rejected_documents(
    conn: &mut PgConnection,
    id: AppointmentId,
) -> Result<Option<UserId>, RepositoryError> {
    let owner = sqlx::query_scalar::<_, UserId>(
        r"
        UPDATE clinic.appointment
        SET boarding_id_verified = NULL, boarding_id_verified_at = NULL,
            boarding_id_rejection_reason = NULL,
            boarding_signature_verified = NULL, boarding_signature_verified_at = NULL,
            boarding_signature_rejection_reason = NULL,
            status = 'pending', updated_at = NOW()
        WHERE id = $1 AND status = 'rejected'
        RETURNING user_id
        ",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(owner)
}
