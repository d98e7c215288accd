//! Payment ledger (staff only).

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use vetclinic_core::{TransactionId, TransactionStatus};

use crate::db::TransactionRepository;
use crate::error::AppError;
use crate::middleware::{Authorized, Staff};
use crate::models::Transaction;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub status: Option<String>,
}

/// GET /api/transactions
#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TransactionStatus>)
        .transpose()?;
    Ok(Json(
        TransactionRepository::new(state.pool()).list(status).await?,
    ))
}

/// GET /api/transactions/{id}
#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<TransactionId>,
) -> Result<Json<Transaction>, AppError> {
    TransactionRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))
}
