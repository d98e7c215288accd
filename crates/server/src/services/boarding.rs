//! Appointment booking and the boarding lifecycle.
//!
//! Booking a boarding stay locks the cage row, re-runs the availability
//! check and writes appointment, reservation and ledger row together, so
//! two clients racing for the same cage cannot both win.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use vetclinic_core::{
    AppointmentId, AppointmentStatus, BoardingDocument, CageId, CageStatus, PetId,
    ReservationStatus, ServiceId, StayRange,
};

use crate::db::appointments::{self, NewAppointment};
use crate::db::transactions::{self, Payable};
use crate::db::{PetRepository, cages, catalog};
use crate::error::AppError;
use crate::models::notification::kinds;
use crate::models::{Appointment, CageReservation, CurrentUser};
use crate::services::notify::{Delivery, Notice, notify_admins, notify_user};

/// A booking request after request parsing.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub pet_id: PetId,
    pub service_id: ServiceId,
    pub appointment_date: NaiveDate,
    pub appointment_time: Option<NaiveTime>,
    pub cage_id: Option<CageId>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Book an appointment for `caller`'s pet (staff may book any pet).
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an inactive service, missing boarding
/// details or an unavailable cage; `AppError::NotFound` for unknown pets or
/// cages; `AppError::Forbidden` for someone else's pet.
#[instrument(skip(pool, caller, request), fields(caller_id = %caller.id))]
pub async fn book(
    pool: &PgPool,
    caller: &CurrentUser,
    request: BookingRequest,
) -> Result<Appointment, AppError> {
    let pet = PetRepository::new(pool)
        .get_by_id(request.pet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet".to_string()))?;
    if !caller.can_access(pet.owner_id) {
        return Err(AppError::Forbidden("Not your pet".to_string()));
    }

    let mut tx = pool.begin().await?;
    let service = catalog::service_for_booking(&mut tx, request.service_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Service is not available".to_string()))?;

    let (boarding, total) = if service.is_boarding {
        let cage_id = request
            .cage_id
            .ok_or_else(|| AppError::BadRequest("Boarding requires a cage".to_string()))?;
        let stay = StayRange::from_optional(request.check_in, request.check_out)?.ok_or_else(
            || AppError::BadRequest("Boarding requires check_in and check_out".to_string()),
        )?;

        let cage = cages::lock(&mut tx, cage_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cage".to_string()))?;
        if cage.status == CageStatus::Maintenance {
            return Err(AppError::BadRequest("Cage is under maintenance".to_string()));
        }
        if cages::has_overlapping_reservation(&mut tx, cage_id, stay).await? {
            return Err(AppError::BadRequest(
                "Cage is not available for the selected dates".to_string(),
            ));
        }
        let rate = cages::daily_rate(&cage)?;
        (Some((cage_id, stay)), boarding_total(service.price, rate.cost_for(&stay)))
    } else {
        (None, service.price)
    };

    let appointment = appointments::insert(
        &mut tx,
        &NewAppointment {
            user_id: pet.owner_id,
            pet_id: pet.id,
            service_id: service.id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            boarding,
            total_amount: total,
            notes: request.notes,
        },
    )
    .await?;

    if let Some((cage_id, stay)) = boarding {
        cages::insert_reservation(&mut tx, cage_id, appointment.id, stay).await?;
    }
    transactions::insert_pending(
        &mut tx,
        appointment.user_id,
        Payable::Appointment(appointment.id),
        total,
    )
    .await?;

    tx.commit().await?;
    info!(appointment_id = %appointment.id, boarding = boarding.is_some(), %total, "Appointment booked");
    Ok(appointment)
}

fn boarding_total(service_price: Decimal, stay_cost: Decimal) -> Decimal {
    service_price + stay_cost
}

/// What completing an appointment does to its cage reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StayOnCompletion {
    /// No active stay: nothing to release.
    Nothing,
    /// The pet is still in its cage: run the check-out steps.
    CheckOut,
}

/// A boarding appointment is completed through check-out, so a checked-in
/// pet is checked out on the way. A stay that never started cannot complete.
fn stay_on_completion(
    reservation: Option<ReservationStatus>,
) -> Result<StayOnCompletion, AppError> {
    match reservation {
        Some(ReservationStatus::CheckedIn) => Ok(StayOnCompletion::CheckOut),
        Some(ReservationStatus::Reserved) => Err(AppError::BadRequest(
            "The pet was never checked in; check it in first or cancel the appointment"
                .to_string(),
        )),
        None | Some(ReservationStatus::CheckedOut | ReservationStatus::Cancelled) => {
            Ok(StayOnCompletion::Nothing)
        }
    }
}

/// Reservation `checked_in -> checked_out` and the cage freed.
async fn finish_stay(
    conn: &mut PgConnection,
    id: AppointmentId,
    reservation: &CageReservation,
) -> Result<(), AppError> {
    cages::set_reservation_status(conn, reservation.id, ReservationStatus::CheckedOut).await?;
    cages::release(conn, reservation.cage_id, id).await?;
    Ok(())
}

/// Cancel an appointment's reservation, free its cage and void its unpaid
/// ledger rows.
async fn release_cancelled(
    conn: &mut PgConnection,
    appointment: &Appointment,
) -> Result<(), AppError> {
    cages::cancel_reservations_for(conn, appointment.id).await?;
    if let Some(cage) = appointment.cage_id {
        cages::release(conn, cage, appointment.id).await?;
    }
    transactions::cancel_pending(conn, Payable::Appointment(appointment.id)).await?;
    Ok(())
}

/// Staff status change, following [`AppointmentStatus::can_transition_to`].
///
/// Cancelling releases the cage reservation and voids the pending payment.
/// Completing a boarding stay checks the pet out.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a disallowed transition, or when
/// completing a boarding stay whose pet was never checked in.
#[instrument(skip(pool, base_url))]
pub async fn change_status(
    pool: &PgPool,
    base_url: &str,
    id: AppointmentId,
    next: AppointmentStatus,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !appointment.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change status from {} to {next}",
            appointment.status
        )));
    }

    match next {
        AppointmentStatus::Cancelled => release_cancelled(&mut tx, &appointment).await?,
        AppointmentStatus::Completed => {
            let reservation = cages::lock_reservation_for(&mut tx, id).await?;
            let step = stay_on_completion(reservation.as_ref().map(|r| r.status))?;
            if let (StayOnCompletion::CheckOut, Some(reservation)) = (step, &reservation) {
                finish_stay(&mut tx, id, reservation).await?;
            }
        }
        _ => {}
    }
    appointments::set_status(&mut tx, id, next).await?;

    let message = format!("Appointment #{id} is now {next}.");
    notify_user(
        &mut tx,
        appointment.user_id,
        Notice {
            title: "Appointment updated",
            message: &message,
            kind: kinds::APPOINTMENT,
        },
        Delivery::InApp,
        base_url,
    )
    .await?;

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, from = %appointment.status, to = %next, "Appointment status changed");
    Ok(updated)
}

/// Client cancellation of their own pending appointment.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for someone else's appointment and
/// `AppError::BadRequest` unless it is still `pending`.
#[instrument(skip(pool, caller), fields(caller_id = %caller.id))]
pub async fn cancel_own(
    pool: &PgPool,
    caller: &CurrentUser,
    id: AppointmentId,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }
    if appointment.status != AppointmentStatus::Pending {
        return Err(AppError::BadRequest(
            "Only pending appointments can be cancelled".to_string(),
        ));
    }

    release_cancelled(&mut tx, &appointment).await?;
    appointments::set_status(&mut tx, id, AppointmentStatus::Cancelled).await?;

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, "Appointment cancelled by client");
    Ok(updated)
}

/// Check a boarded pet in: reservation `reserved -> checked_in`, cage occupied.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the appointment has no reservation
/// awaiting check-in or is not in an open status.
#[instrument(skip(pool))]
pub async fn check_in(pool: &PgPool, id: AppointmentId) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if appointment.status.is_terminal() || appointment.status == AppointmentStatus::Rejected {
        return Err(AppError::BadRequest(format!(
            "Cannot check in a {} appointment",
            appointment.status
        )));
    }

    let reservation = cages::lock_reservation_for(&mut tx, id)
        .await?
        .filter(|r| r.status == ReservationStatus::Reserved)
        .ok_or_else(|| AppError::BadRequest("No reservation awaiting check-in".to_string()))?;
    let stay = reservation
        .stay()
        .ok_or_else(|| AppError::Internal(format!("reservation {} has inverted dates", reservation.id)))?;

    let cage = cages::lock(&mut tx, reservation.cage_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cage".to_string()))?;
    if cage.status == CageStatus::Occupied {
        return Err(AppError::BadRequest("Cage is still occupied".to_string()));
    }

    cages::set_reservation_status(&mut tx, reservation.id, ReservationStatus::CheckedIn).await?;
    cages::occupy(&mut tx, cage.id, appointment.pet_id, id, stay).await?;
    if appointment.status != AppointmentStatus::Confirmed {
        appointments::set_status(&mut tx, id, AppointmentStatus::Confirmed).await?;
    }

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, cage_id = %cage.id, "Pet checked in");
    Ok(updated)
}

/// Check a boarded pet out: reservation `checked_in -> checked_out`, cage
/// freed, appointment completed.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the pet is not checked in.
#[instrument(skip(pool, base_url))]
pub async fn check_out(
    pool: &PgPool,
    base_url: &str,
    id: AppointmentId,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;

    let reservation = cages::lock_reservation_for(&mut tx, id)
        .await?
        .filter(|r| r.status == ReservationStatus::CheckedIn)
        .ok_or_else(|| AppError::BadRequest("Pet is not checked in".to_string()))?;

    finish_stay(&mut tx, id, &reservation).await?;
    appointments::set_status(&mut tx, id, AppointmentStatus::Completed).await?;

    let message = format!("Your pet has been checked out. Appointment #{id} is complete.");
    notify_user(
        &mut tx,
        appointment.user_id,
        Notice {
            title: "Boarding complete",
            message: &message,
            kind: kinds::APPOINTMENT,
        },
        Delivery::InApp,
        base_url,
    )
    .await?;

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, cage_id = %reservation.cage_id, "Pet checked out");
    Ok(updated)
}

// =============================================================================
// Boarding documents
// =============================================================================

/// Attach uploaded boarding documents.
///
/// Returns the updated appointment and the URLs of the files the new
/// documents replace.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a rejected appointment (it must be
/// reset first) or one that is already closed.
#[instrument(skip(pool, caller, documents), fields(caller_id = %caller.id))]
pub async fn attach_documents(
    pool: &PgPool,
    caller: &CurrentUser,
    id: AppointmentId,
    documents: &[(BoardingDocument, String)],
) -> Result<(Appointment, Vec<String>), AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }
    if appointment.status.can_reupload_documents() {
        return Err(AppError::BadRequest(
            "Documents were rejected; request a re-upload first".to_string(),
        ));
    }
    if !appointment.status.accepts_documents() {
        return Err(AppError::BadRequest(format!(
            "Cannot upload documents for a {} appointment",
            appointment.status
        )));
    }

    let mut superseded = Vec::new();
    for (document, url) in documents {
        let previous = match document {
            BoardingDocument::Id => &appointment.boarding_id_url,
            BoardingDocument::Signature => &appointment.boarding_signature_url,
        };
        superseded.extend(previous.iter().filter(|old| *old != url).cloned());
        appointments::attach_document(&mut tx, id, *document, url).await?;
    }

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, count = documents.len(), "Boarding documents uploaded");
    Ok((updated, superseded))
}

/// Approve or reject one boarding document.
///
/// Rejection needs a reason, moves the appointment to `rejected` and tells
/// the owner by notification and email.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the document was never uploaded or a
/// rejection has no reason.
#[instrument(skip(pool, base_url, reason))]
pub async fn review_document(
    pool: &PgPool,
    base_url: &str,
    id: AppointmentId,
    document: BoardingDocument,
    approved: bool,
    reason: Option<&str>,
) -> Result<Appointment, AppError> {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    if !approved && reason.is_none() {
        return Err(AppError::BadRequest(
            "A reason is required when rejecting a document".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    let uploaded = match document {
        BoardingDocument::Id => appointment.boarding_id_url.is_some(),
        BoardingDocument::Signature => appointment.boarding_signature_url.is_some(),
    };
    if !uploaded {
        return Err(AppError::BadRequest(format!(
            "No {} has been uploaded",
            document.label()
        )));
    }
    if appointment.status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Cannot review documents of a {} appointment",
            appointment.status
        )));
    }

    appointments::record_document_review(&mut tx, id, document, approved, reason).await?;

    if !approved {
        appointments::set_status(&mut tx, id, AppointmentStatus::Rejected).await?;
        let message = format!(
            "Your {} for appointment #{id} was rejected: {}. Please request a re-upload \
             and send a new one.",
            document.label(),
            reason.unwrap_or_default()
        );
        notify_user(
            &mut tx,
            appointment.user_id,
            Notice {
                title: "Boarding document rejected",
                message: &message,
                kind: kinds::DOCUMENTS,
            },
            Delivery::InAppAndEmail,
            base_url,
        )
        .await?;
    }

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, document = %document, approved, "Boarding document reviewed");
    Ok(updated)
}

/// Reset a rejected appointment's documents so the owner can upload again.
///
/// Only `rejected` appointments qualify; anything else is a 400 and nothing
/// changes. Every admin is notified.
///
/// # Errors
///
/// Returns `AppError::BadRequest` unless the appointment is `rejected`.
#[instrument(skip(pool, caller), fields(caller_id = %caller.id))]
pub async fn request_reupload(
    pool: &PgPool,
    caller: &CurrentUser,
    id: AppointmentId,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }

    if appointments::reset_rejected_documents(&mut tx, id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest(format!(
            "Only rejected appointments can re-upload documents (status is {})",
            appointment.status
        )));
    }

    let message = format!(
        "{} reset the boarding documents of appointment #{id} for re-upload.",
        caller.name
    );
    let admins = notify_admins(
        &mut tx,
        Notice {
            title: "Boarding documents re-upload",
            message: &message,
            kind: kinds::DOCUMENTS,
        },
    )
    .await?;

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, admins_notified = admins, "Boarding documents reset");
    Ok(updated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_boarding_total_adds_stay_cost() {
        assert_eq!(
            boarding_total(Decimal::new(1500, 2), Decimal::new(9000, 2)),
            Decimal::new(10500, 2)
        );
    }

    #[test]
    fn test_completing_checked_in_stay_checks_out() {
        assert_eq!(
            stay_on_completion(Some(ReservationStatus::CheckedIn)).unwrap(),
            StayOnCompletion::CheckOut
        );
    }

    #[test]
    fn test_completing_unstarted_stay_is_refused() {
        let err = stay_on_completion(Some(ReservationStatus::Reserved)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_completing_without_active_stay_needs_nothing() {
        for reservation in [
            None,
            Some(ReservationStatus::CheckedOut),
            Some(ReservationStatus::Cancelled),
        ] {
            assert_eq!(
                stay_on_completion(reservation).unwrap(),
                StayOnCompletion::Nothing
            );
        }
    }
}
