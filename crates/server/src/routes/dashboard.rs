//! Staff dashboard.

use axum::{Json, extract::State};
use chrono::Utc;
use tracing::instrument;

use crate::db::DashboardRepository;
use crate::db::dashboard::DashboardStats;
use crate::error::AppError;
use crate::middleware::{Authorized, Staff};
use crate::state::AppState;

/// Aggregate counts, served from a short-lived cache.
///
/// GET /api/dashboard
#[instrument(skip(state, _staff))]
pub async fn stats(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
) -> Result<Json<DashboardStats>, AppError> {
    let pool = state.pool().clone();
    let stats = state
        .dashboard_cache()
        .try_get_with((), async move {
            DashboardRepository::new(&pool)
                .stats(Utc::now().date_naive())
                .await
        })
        .await
        .map_err(|e| AppError::Internal(format!("Failed to load dashboard: {e}")))?;
    Ok(Json(stats))
}
