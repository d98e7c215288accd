//! Notification route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use vetclinic_core::{NotificationId, UserId};

use super::ActionResponse;
use crate::db::{NotificationRepository, RepositoryError, UserRepository};
use crate::error::AppError;
use crate::middleware::{AnyUser, Authorized, Staff};
use crate::models::Notification;
use crate::models::notification::kinds;
use crate::services::{Delivery, Notice, notify::notify_user};
use crate::state::AppState;

fn not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Notification".to_string()),
        other => other.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/notifications
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = NotificationRepository::new(state.pool())
        .list_for(caller.id, query.unread_only)
        .await?;
    Ok(Json(notifications))
}

/// POST /api/notifications/{id}/read
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn mark_read(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<NotificationId>,
) -> Result<Json<ActionResponse>, AppError> {
    NotificationRepository::new(state.pool())
        .mark_read(caller.id, id)
        .await
        .map_err(not_found)?;
    Ok(ActionResponse::ok("Notification marked as read"))
}

/// POST /api/notifications/read-all
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
) -> Result<Json<ActionResponse>, AppError> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(caller.id)
        .await?;
    Ok(ActionResponse::ok(format!(
        "{updated} notification(s) marked as read"
    )))
}

/// DELETE /api/notifications/{id}
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<NotificationId>,
) -> Result<Json<ActionResponse>, AppError> {
    NotificationRepository::new(state.pool())
        .delete(caller.id, id)
        .await
        .map_err(not_found)?;
    Ok(ActionResponse::ok("Notification deleted"))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: Option<String>,
    /// Also email the recipient.
    #[serde(default)]
    pub email: bool,
}

impl SendRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Title and message are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Send a notification to one user.
///
/// POST /api/notifications
#[instrument(skip(state, sender, request), fields(sender_id = %sender.id, recipient = %request.user_id))]
pub async fn send(
    State(state): State<AppState>,
    Authorized(sender, _): Authorized<Staff>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), AppError> {
    request.validate()?;
    UserRepository::new(state.pool())
        .get_by_id(request.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    let delivery = if request.email {
        Delivery::InAppAndEmail
    } else {
        Delivery::InApp
    };
    let notice = Notice {
        title: request.title.trim(),
        message: request.message.trim(),
        kind: request
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(kinds::GENERAL),
    };

    let mut tx = state.pool().begin().await?;
    notify_user(
        &mut tx,
        request.user_id,
        notice,
        delivery,
        &state.config().base_url,
    )
    .await?;
    tx.commit().await?;

    info!(?delivery, "Notification sent");
    Ok((StatusCode::CREATED, ActionResponse::ok("Notification sent")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_title_and_message() {
        let request: SendRequest =
            serde_json::from_str(r#"{"user_id":2,"title":"  ","message":"Hi"}"#).unwrap();
        assert!(request.validate().is_err());
        assert!(!request.email);

        let request: SendRequest =
            serde_json::from_str(r#"{"user_id":2,"title":"Reminder","message":"Vaccines due"}"#)
                .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unread_only_defaults_to_false() {
        let query: NotificationQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.unread_only);
    }
}
