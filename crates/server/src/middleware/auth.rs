//! Authentication extractors.
//!
//! Handlers state the role they need in their signature:
//!
//! ```rust,ignore
//! async fn delete_cage(
//!     State(state): State<AppState>,
//!     Authorized(admin, _): Authorized<AdminOnly>,
//!     Path(id): Path<CageId>,
//! ) -> Result<Json<ActionResponse>, AppError> { ... }
//! ```
//!
//! The caller is read from the session once per request and cached in the
//! request extensions, so several extractors on one handler share a lookup.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use vetclinic_core::UserRole;

use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};

/// Which roles an [`Authorized`] extractor admits.
pub trait RolePolicy: Send + Sync + 'static {
    /// Used in the 403 message.
    const REQUIRED: &'static str;

    fn allows(role: UserRole) -> bool;
}

/// Any logged-in user.
pub struct AnyUser;

/// Employees and admins.
pub struct Staff;

/// Admins only.
pub struct AdminOnly;

impl RolePolicy for AnyUser {
    const REQUIRED: &'static str = "Login";

    fn allows(_role: UserRole) -> bool {
        true
    }
}

impl RolePolicy for Staff {
    const REQUIRED: &'static str = "Staff access";

    fn allows(role: UserRole) -> bool {
        role.is_staff()
    }
}

impl RolePolicy for AdminOnly {
    const REQUIRED: &'static str = "Admin access";

    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

/// Extractor that requires a logged-in user admitted by `P`.
///
/// Rejects with 401 when nobody is logged in and 403 when the role does not
/// qualify. The body is the usual `{success: false, error}` JSON.
pub struct Authorized<P: RolePolicy = AnyUser>(pub CurrentUser, pub PhantomData<fn() -> P>);

impl<P: RolePolicy> Authorized<P> {
    #[must_use]
    pub fn into_inner(self) -> CurrentUser {
        self.0
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: RolePolicy,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = resolve_current_user(parts)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        if !P::allows(user.role) {
            return Err(AppError::Forbidden(format!("{} required", P::REQUIRED)));
        }

        Ok(Self(user, PhantomData))
    }
}

/// Extractor that optionally gets the current user.
///
/// Never rejects; public endpoints use it to widen results for staff.
pub struct MaybeUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_current_user(parts).await.ok().flatten()))
    }
}

async fn resolve_current_user(parts: &mut Parts) -> Result<Option<CurrentUser>, AppError> {
    if let Some(cached) = parts.extensions.get::<CurrentUser>() {
        return Ok(Some(cached.clone()));
    }

    let Some(session) = parts.extensions.get::<Session>().cloned() else {
        return Ok(None);
    };

    let user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    if let Some(user) = &user {
        set_sentry_user(user.id.as_i32(), Some(user.email.as_str()));
        parts.extensions.insert(user.clone());
    }
    Ok(user)
}

/// Store the logged-in user in the session.
///
/// The session ID is cycled first to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    use vetclinic_core::{Email, UserId};

    use super::*;

    fn parts() -> Parts {
        Request::builder()
            .uri("/api/cages")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: Email::parse("desk@clinic.test").unwrap(),
            name: "Front Desk".to_string(),
            role,
        }
    }

    #[test]
    fn test_policies() {
        assert!(AnyUser::allows(UserRole::Client));
        assert!(!Staff::allows(UserRole::Client));
        assert!(Staff::allows(UserRole::Employee));
        assert!(!AdminOnly::allows(UserRole::Employee));
        assert!(AdminOnly::allows(UserRole::Admin));
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let mut parts = parts();
        let rejection = Authorized::<AnyUser>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cached_user_is_checked_against_policy() {
        let mut parts = parts();
        parts.extensions.insert(user(UserRole::Employee));

        let staff = Authorized::<Staff>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(staff.into_inner().id, UserId::new(7));

        let rejection = Authorized::<AdminOnly>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_maybe_user_never_rejects() {
        let mut parts = parts();
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());
    }
}
