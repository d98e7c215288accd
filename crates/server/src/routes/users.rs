//! User administration and the caller's own profile.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use vetclinic_core::{Email, UserId, UserRole};

use crate::db::UserRepository;
use crate::db::users::{UserChanges, UserFilter};
use crate::error::AppError;
use crate::middleware::{AdminOnly, AnyUser, Authorized};
use crate::models::User;
use crate::routes::ActionResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

/// GET /api/users
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = UserRepository::new(state.pool())
        .list(&UserFilter {
            search: query.search,
            role: query.role,
        })
        .await?;
    Ok(Json(users))
}

/// GET /api/users/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    Ok(Json(user))
}

/// Fields a user may change. `role` is honored only on the admin endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<UserRole>,
}

impl UpdateUserRequest {
    fn into_changes(self, allow_role: bool) -> Result<UserChanges, AppError> {
        let email = self.email.as_deref().map(Email::parse).transpose()?;
        let name = self.name.map(|n| n.trim().to_string());
        if name.as_deref().is_some_and(str::is_empty) {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
        Ok(UserChanges {
            email,
            name,
            phone: self.phone,
            address: self.address,
            role: if allow_role { self.role } else { None },
        })
    }
}

/// PUT /api/users/{id}
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    Authorized(admin, _): Authorized<AdminOnly>,
    Path(id): Path<UserId>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    if id == admin.id && request.role.is_some_and(|role| role != UserRole::Admin) {
        return Err(AppError::BadRequest("You cannot demote yourself".to_string()));
    }
    let changes = request.into_changes(true)?;
    let user = UserRepository::new(state.pool()).update(id, &changes).await?;

    info!(user_id = %id, role = %user.role, "User updated");
    Ok(Json(user))
}

/// DELETE /api/users/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    Authorized(admin, _): Authorized<AdminOnly>,
    Path(id): Path<UserId>,
) -> Result<Json<ActionResponse>, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }
    UserRepository::new(state.pool()).delete(id).await?;

    info!(user_id = %id, "User deleted");
    Ok(ActionResponse::ok("User deleted"))
}

/// GET /api/profile
pub async fn profile(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(caller.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    Ok(Json(user))
}

/// PUT /api/profile
#[instrument(skip(state, caller, request), fields(user_id = %caller.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let changes = request.into_changes(false)?;
    let user = UserRepository::new(state.pool())
        .update(caller.id, &changes)
        .await?;
    Ok(Json(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_changes_drop_role() {
        let request = UpdateUserRequest {
            role: Some(UserRole::Admin),
            ..Default::default()
        };
        assert_eq!(request.into_changes(false).unwrap().role, None);
    }

    #[test]
    fn test_invalid_email_and_blank_name_rejected() {
        let request = UpdateUserRequest {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(matches!(request.into_changes(true), Err(AppError::BadRequest(_))));

        let request = UpdateUserRequest {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(request.into_changes(true).is_err());
    }
}
