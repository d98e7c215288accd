//! Appointment route handlers: booking, lifecycle, receipts and boarding
//! documents.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::instrument;

use vetclinic_core::{
    AppointmentId, AppointmentStatus, BoardingDocument, CageId, PetId, ServiceId,
};

use crate::db::AppointmentRepository;
use crate::db::appointments::AppointmentFilter;
use crate::error::AppError;
use crate::middleware::{AnyUser, Authorized, Staff};
use crate::models::{Appointment, AppointmentDetail, CurrentUser};
use crate::services::boarding::{self, BookingRequest};
use crate::services::{UploadKind, UploadStore, verification};
use crate::state::AppState;

/// Load an appointment the caller may act on.
async fn accessible(
    state: &AppState,
    caller: &CurrentUser,
    id: AppointmentId,
) -> Result<Appointment, AppError> {
    let appointment = AppointmentRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }
    Ok(appointment)
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<String>,
}

/// GET /api/appointments
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentDetail>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<AppointmentStatus>)
        .transpose()?;
    let appointments = AppointmentRepository::new(state.pool())
        .list(AppointmentFilter {
            owner: (!caller.is_staff()).then_some(caller.id),
            status,
        })
        .await?;
    Ok(Json(appointments))
}

/// GET /api/appointments/{id}
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<AppointmentDetail>, AppError> {
    let detail = AppointmentRepository::new(state.pool())
        .get_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment".to_string()))?;
    if !caller.can_access(detail.appointment.user_id) {
        return Err(AppError::Forbidden("Not your appointment".to_string()));
    }
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub pet_id: PetId,
    pub service_id: ServiceId,
    pub appointment_date: NaiveDate,
    pub appointment_time: Option<NaiveTime>,
    pub cage_id: Option<CageId>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Book an appointment. Boarding services also reserve a cage.
///
/// POST /api/appointments
#[instrument(skip(state, caller, request), fields(user_id = %caller.id))]
pub async fn create(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = boarding::book(
        state.pool(),
        &caller,
        BookingRequest {
            pet_id: request.pet_id,
            service_id: request.service_id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            cage_id: request.cage_id,
            check_in: request.check_in,
            check_out: request.check_out,
            notes: request.notes,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// PUT /api/appointments/{id}/status
#[instrument(skip(state, _staff, request))]
pub async fn update_status(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<AppointmentId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let next = request.status.parse::<AppointmentStatus>()?;
    let appointment =
        boarding::change_status(state.pool(), &state.config().base_url, id, next).await?;
    Ok(Json(appointment))
}

/// POST /api/appointments/{id}/cancel
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn cancel(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(boarding::cancel_own(state.pool(), &caller, id).await?))
}

/// POST /api/appointments/{id}/check-in
#[instrument(skip(state, _staff))]
pub async fn check_in(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(boarding::check_in(state.pool(), id).await?))
}

/// POST /api/appointments/{id}/check-out
#[instrument(skip(state, _staff))]
pub async fn check_out(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        boarding::check_out(state.pool(), &state.config().base_url, id).await?,
    ))
}

// =============================================================================
// Payment receipt
// =============================================================================

/// Upload a payment receipt (multipart field `file`).
///
/// POST /api/appointments/{id}/receipt
#[instrument(skip(state, caller, multipart), fields(user_id = %caller.id))]
pub async fn upload_receipt(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<AppointmentId>,
    mut multipart: Multipart,
) -> Result<Json<Appointment>, AppError> {
    let appointment = accessible(&state, &caller, id).await?;
    if !appointment.status.accepts_receipt() {
        return Err(AppError::BadRequest(format!(
            "Cannot upload a receipt for a {} appointment",
            appointment.status
        )));
    }
    let file = UploadStore::receive_one(&mut multipart, UploadKind::Receipt, "file").await?;
    let url = state.uploads().save(UploadKind::Receipt, &file).await?;

    match verification::attach_appointment_receipt(state.pool(), id, &caller, &url).await {
        Ok(Some(previous)) => state.uploads().discard(&previous).await,
        Ok(None) => {}
        Err(err) => {
            state.uploads().discard(&url).await;
            return Err(err);
        }
    }
    Ok(Json(accessible(&state, &caller, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approved: bool,
}

/// POST /api/appointments/{id}/receipt/verify
#[instrument(skip(state, reviewer, request), fields(reviewer_id = %reviewer.id))]
pub async fn verify_receipt(
    State(state): State<AppState>,
    Authorized(reviewer, _): Authorized<Staff>,
    Path(id): Path<AppointmentId>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = verification::review_appointment_receipt(
        state.pool(),
        &state.config().base_url,
        id,
        request.approved,
        &reviewer,
    )
    .await?;
    Ok(Json(appointment))
}

// =============================================================================
// Boarding documents
// =============================================================================

fn document_for_field(field: &str) -> Option<BoardingDocument> {
    BoardingDocument::ALL
        .iter()
        .copied()
        .find(|document| document.form_field() == field)
}

async fn discard_all<'a>(state: &AppState, urls: impl IntoIterator<Item = &'a String>) {
    for url in urls {
        state.uploads().discard(url).await;
    }
}

/// Upload boarding documents (multipart fields `boarding_id` and/or
/// `boarding_signature`).
///
/// POST /api/appointments/{id}/documents
#[instrument(skip(state, caller, multipart), fields(user_id = %caller.id))]
pub async fn upload_documents(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<AppointmentId>,
    mut multipart: Multipart,
) -> Result<Json<Appointment>, AppError> {
    let appointment = accessible(&state, &caller, id).await?;
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

    let fields: Vec<&str> = BoardingDocument::ALL
        .iter()
        .map(|document| document.form_field())
        .collect();
    let files = UploadStore::receive(&mut multipart, UploadKind::BoardingDocument, &fields).await?;
    if files.is_empty() {
        return Err(AppError::BadRequest(
            "Upload boarding_id and/or boarding_signature".to_string(),
        ));
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let Some(document) = document_for_field(&file.field) else {
            continue;
        };
        match state.uploads().save(UploadKind::BoardingDocument, file).await {
            Ok(url) => documents.push((document, url)),
            Err(err) => {
                discard_all(&state, documents.iter().map(|(_, url)| url).collect::<Vec<_>>()).await;
                return Err(err.into());
            }
        }
    }

    match boarding::attach_documents(state.pool(), &caller, id, &documents).await {
        Ok((appointment, superseded)) => {
            discard_all(&state, &superseded).await;
            Ok(Json(appointment))
        }
        Err(err) => {
            discard_all(&state, documents.iter().map(|(_, url)| url).collect::<Vec<_>>()).await;
            Err(err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentReviewRequest {
    pub document: String,
    pub approved: bool,
    pub reason: Option<String>,
}

/// POST /api/appointments/{id}/documents/verify
#[instrument(skip(state, _staff, request))]
pub async fn verify_document(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<AppointmentId>,
    Json(request): Json<DocumentReviewRequest>,
) -> Result<Json<Appointment>, AppError> {
    let document = request.document.parse::<BoardingDocument>()?;
    let appointment = boarding::review_document(
        state.pool(),
        &state.config().base_url,
        id,
        document,
        request.approved,
        request.reason.as_deref(),
    )
    .await?;
    Ok(Json(appointment))
}

/// Reset rejected documents so new ones can be uploaded.
///
/// POST /api/appointments/{id}/documents/reupload
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn reupload_documents(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        boarding::request_reupload(state.pool(), &caller, id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_fields_map_back() {
        assert_eq!(document_for_field("boarding_id"), Some(BoardingDocument::Id));
        assert_eq!(
            document_for_field("boarding_signature"),
            Some(BoardingDocument::Signature)
        );
        assert_eq!(document_for_field("file"), None);
    }
}
