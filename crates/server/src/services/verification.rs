//! Payment receipt upload and review.
//!
//! A review touches the parent record, its ledger rows, a notification and
//! the email outbox. All of it commits in one transaction.

use sqlx::PgPool;
use tracing::{info, instrument};

use vetclinic_core::{AppointmentId, AppointmentStatus, OrderId, OrderStatus};

use crate::db::transactions::{self, Payable};
use crate::db::{appointments, orders};
use crate::error::AppError;
use crate::models::notification::kinds;
use crate::models::{Appointment, CurrentUser, Order};
use crate::services::notify::{Delivery, Notice, notify_user};

/// Attach an uploaded receipt to an appointment.
///
/// A `pending` appointment moves to `pending payment`; `pending payment`
/// and `paid` are kept. Earlier verification is discarded. Returns the URL
/// of the receipt this one replaces.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown appointment,
/// `AppError::Forbidden` if the caller does not own it, and
/// `AppError::BadRequest` outside the payment stages.
#[instrument(skip(pool, caller, url), fields(caller_id = %caller.id))]
pub async fn attach_appointment_receipt(
    pool: &PgPool,
    id: AppointmentId,
    caller: &CurrentUser,
    url: &str,
) -> Result<Option<String>, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }
    if !appointment.status.accepts_receipt() {
        return Err(AppError::BadRequest(format!(
            "Cannot upload a receipt for a {} appointment",
            appointment.status
        )));
    }

    let status = if appointment.status == AppointmentStatus::Pending {
        AppointmentStatus::PendingPayment
    } else {
        appointment.status
    };
    appointments::attach_receipt(&mut tx, id, url, status).await?;
    tx.commit().await?;

    info!(appointment_id = %id, "Receipt uploaded");
    Ok(appointment.receipt_url)
}

/// Approve or reject an appointment's payment receipt.
///
/// Approval marks the appointment `paid` and completes its ledger rows.
/// Rejection returns it to `pending payment` and leaves the ledger alone.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown appointment and
/// `AppError::BadRequest` if no receipt has been uploaded or the
/// appointment is not awaiting or holding payment.
#[instrument(skip(pool, reviewer, base_url), fields(reviewer_id = %reviewer.id))]
pub async fn review_appointment_receipt(
    pool: &PgPool,
    base_url: &str,
    id: AppointmentId,
    approved: bool,
    reviewer: &CurrentUser,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if appointment.receipt_url.is_none() {
        return Err(AppError::BadRequest("No receipt uploaded".to_string()));
    }
    if !appointment.status.accepts_receipt_review() {
        return Err(AppError::BadRequest(format!(
            "Cannot review the receipt of a {} appointment",
            appointment.status
        )));
    }

    appointments::record_receipt_review(&mut tx, id, approved, reviewer.id).await?;
    if approved {
        transactions::complete(&mut tx, Payable::Appointment(id)).await?;
    }

    let message = if approved {
        format!("Your payment for appointment #{id} has been verified.")
    } else {
        format!(
            "We could not verify the payment receipt for appointment #{id}. \
             Please upload a new receipt."
        )
    };
    let title = if approved {
        "Payment verified"
    } else {
        "Payment receipt rejected"
    };
    notify_user(
        &mut tx,
        appointment.user_id,
        Notice {
            title,
            message: &message,
            kind: kinds::PAYMENT,
        },
        Delivery::InAppAndEmail,
        base_url,
    )
    .await?;

    let updated = appointments::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    tx.commit().await?;

    info!(appointment_id = %id, approved, status = %updated.status, "Receipt reviewed");
    Ok(updated)
}

/// Attach an uploaded receipt to an order. Returns the URL of the receipt
/// this one replaces.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order,
/// `AppError::Forbidden` if the caller does not own it, and
/// `AppError::BadRequest` if it was cancelled.
#[instrument(skip(pool, caller, url), fields(caller_id = %caller.id))]
pub async fn attach_order_receipt(
    pool: &PgPool,
    id: OrderId,
    caller: &CurrentUser,
    url: &str,
) -> Result<Option<String>, AppError> {
    let mut tx = pool.begin().await?;
    let order = orders::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    if !caller.can_access(order.user_id) {
        return Err(AppError::Forbidden("Not your order".to_string()));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cannot upload a receipt for a cancelled order".to_string(),
        ));
    }

    orders::attach_receipt(&mut tx, id, url).await?;
    tx.commit().await?;

    info!(order_id = %id, "Receipt uploaded");
    Ok(order.receipt_url)
}

/// Approve or reject an order's payment receipt.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order and
/// `AppError::BadRequest` if no receipt has been uploaded.
#[instrument(skip(pool, reviewer, base_url), fields(reviewer_id = %reviewer.id))]
pub async fn review_order_receipt(
    pool: &PgPool,
    base_url: &str,
    id: OrderId,
    approved: bool,
    reviewer: &CurrentUser,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;
    let order = orders::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    if order.receipt_url.is_none() {
        return Err(AppError::BadRequest("No receipt uploaded".to_string()));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cannot review the receipt of a cancelled order".to_string(),
        ));
    }

    orders::record_receipt_review(&mut tx, id, approved, reviewer.id).await?;
    if approved {
        transactions::complete(&mut tx, Payable::Order(id)).await?;
    }

    let message = if approved {
        format!("Your payment for order #{id} has been verified. We are preparing your order.")
    } else {
        format!(
            "We could not verify the payment receipt for order #{id}. \
             Please upload a new receipt."
        )
    };
    let title = if approved {
        "Order confirmed"
    } else {
        "Payment receipt rejected"
    };
    notify_user(
        &mut tx,
        order.user_id,
        Notice {
            title,
            message: &message,
            kind: kinds::ORDER,
        },
        Delivery::InAppAndEmail,
        base_url,
    )
    .await?;

    let updated = orders::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    tx.commit().await?;

    info!(order_id = %id, approved, status = %updated.status, "Receipt reviewed");
    Ok(updated)
}
