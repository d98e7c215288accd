//! Authentication route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use vetclinic_core::UserRole;

use crate::error::AppError;
use crate::middleware::{AnyUser, Authorized, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::ActionResponse;
use crate::services::password_reset::{self, RESET_REQUESTED_MESSAGE};
use crate::services::{AuthService, Registration};
use crate::state::AppState;

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Create a client account.
///
/// POST /api/auth/register
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &request.email,
            password: &request.password,
            name: &request.name,
            phone: request.phone.as_deref(),
            address: request.address.as_deref(),
            role: UserRole::Client,
        })
        .await?;

    info!(user_id = %user.id, "Client registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verify credentials and start a session.
///
/// POST /api/auth/login
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<CurrentUser>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&request.email, &request.password)
        .await?;

    set_current_user(&session, &user)
        .await
        .map_err(|e| session_error(&e))?;

    info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(user))
}

/// POST /api/auth/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<ActionResponse>, AppError> {
    clear_current_user(&session)
        .await
        .map_err(|e| session_error(&e))?;
    Ok(ActionResponse::ok("Logged out"))
}

/// GET /api/auth/me
pub async fn me(Authorized(user, _): Authorized<AnyUser>) -> Json<CurrentUser> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Issue a reset link. The answer never reveals whether the account exists.
///
/// POST /api/auth/forgot-password
#[instrument(skip(state, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    password_reset::request_reset(state.pool(), &state.config().base_url, &request.email).await?;
    Ok(ActionResponse::ok(RESET_REQUESTED_MESSAGE))
}

/// GET /api/auth/reset-password/{token}
#[instrument(skip_all)]
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    password_reset::validate_token(state.pool(), &token).await?;
    Ok(ActionResponse::ok("Token is valid"))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// POST /api/auth/reset-password
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    password_reset::reset_password(state.pool(), &request.token, &request.password).await?;
    Ok(ActionResponse::ok("Password has been reset"))
}
