//! Cage route handlers: availability listing and admin CRUD.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use vetclinic_core::{CageId, CageStatus, CageType, DailyRate, StayRange};

use crate::db::CageRepository;
use crate::db::cages::{CageChanges, CageFilter, NewCage};
use crate::error::AppError;
use crate::middleware::{AdminOnly, AnyUser, Authorized, Staff};
use crate::models::{Cage, CageListing, CageReservation};
use crate::routes::ActionResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CageQuery {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub cage_type: Option<String>,
}

impl CageQuery {
    fn filter(&self) -> Result<CageFilter, AppError> {
        Ok(CageFilter {
            status: self.status.as_deref().map(str::parse::<CageStatus>).transpose()?,
            cage_type: self
                .cage_type
                .as_deref()
                .map(str::parse::<CageType>)
                .transpose()?,
        })
    }
}

/// Either the cages free for a stay, or every cage with its occupancy.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CageList {
    Available(Vec<Cage>),
    Occupancy(Vec<CageListing>),
}

/// List cages.
///
/// With `check_in` and `check_out`, only cages with no active reservation
/// overlapping the (inclusive) stay are returned. Without dates, every cage
/// is returned with its current occupant and next reservation.
///
/// GET /api/cages
#[instrument(skip(state, _caller))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<AnyUser>,
    Query(query): Query<CageQuery>,
) -> Result<Json<CageList>, AppError> {
    let filter = query.filter()?;
    let stay = StayRange::from_optional(query.check_in, query.check_out)?;
    let cages = CageRepository::new(state.pool());

    let list = match stay {
        Some(stay) => CageList::Available(cages.list_available(stay, filter).await?),
        None => CageList::Occupancy(
            cages
                .list_with_occupancy(filter, Utc::now().date_naive())
                .await?,
        ),
    };
    Ok(Json(list))
}

#[derive(Debug, Serialize)]
pub struct CageDetail {
    #[serde(flatten)]
    pub cage: Cage,
    pub reservations: Vec<CageReservation>,
}

/// GET /api/cages/{id}
#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(_staff, _): Authorized<Staff>,
    Path(id): Path<CageId>,
) -> Result<Json<CageDetail>, AppError> {
    let cages = CageRepository::new(state.pool());
    let cage = cages
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cage".to_string()))?;
    let reservations = cages.reservations(id).await?;
    Ok(Json(CageDetail { cage, reservations }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CageRequest {
    pub cage_number: Option<String>,
    pub cage_type: Option<String>,
    pub capacity: Option<i32>,
    pub daily_rate: Option<Decimal>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl CageRequest {
    fn into_changes(self) -> Result<CageChanges, AppError> {
        let cage_number = self.cage_number.map(|n| n.trim().to_string());
        if cage_number.as_deref().is_some_and(str::is_empty) {
            return Err(AppError::BadRequest("Cage number cannot be empty".to_string()));
        }
        if self.capacity.is_some_and(|c| c < 1) {
            return Err(AppError::BadRequest("Capacity must be at least 1".to_string()));
        }
        let status = self
            .status
            .as_deref()
            .map(str::parse::<CageStatus>)
            .transpose()?;
        if status == Some(CageStatus::Occupied) {
            return Err(AppError::BadRequest(
                "Cages become occupied through check-in".to_string(),
            ));
        }

        Ok(CageChanges {
            cage_number,
            cage_type: self.cage_type.as_deref().map(str::parse::<CageType>).transpose()?,
            capacity: self.capacity,
            daily_rate: self.daily_rate.map(DailyRate::new).transpose()?,
            status,
            notes: self.notes,
        })
    }
}

/// POST /api/cages
#[instrument(skip(state, _admin, request))]
pub async fn create(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Json(request): Json<CageRequest>,
) -> Result<(StatusCode, Json<Cage>), AppError> {
    let changes = request.into_changes()?;
    let new = NewCage {
        cage_number: changes
            .cage_number
            .ok_or_else(|| AppError::BadRequest("Cage number is required".to_string()))?,
        cage_type: changes
            .cage_type
            .ok_or_else(|| AppError::BadRequest("Cage type is required".to_string()))?,
        capacity: changes.capacity.unwrap_or(1),
        daily_rate: changes
            .daily_rate
            .ok_or_else(|| AppError::BadRequest("Daily rate is required".to_string()))?,
        notes: changes.notes,
    };

    let cage = CageRepository::new(state.pool()).create(&new).await?;
    info!(cage_id = %cage.id, cage_number = %cage.cage_number, "Cage created");
    Ok((StatusCode::CREATED, Json(cage)))
}

/// PUT /api/cages/{id}
#[instrument(skip(state, _admin, request))]
pub async fn update(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<CageId>,
    Json(request): Json<CageRequest>,
) -> Result<Json<Cage>, AppError> {
    let changes = request.into_changes()?;
    let cage = CageRepository::new(state.pool()).update(id, &changes).await?;
    info!(cage_id = %id, "Cage updated");
    Ok(Json(cage))
}

/// DELETE /api/cages/{id}
#[instrument(skip(state, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<CageId>,
) -> Result<Json<ActionResponse>, AppError> {
    CageRepository::new(state.pool()).delete(id).await?;
    info!(cage_id = %id, "Cage deleted");
    Ok(ActionResponse::ok("Cage deleted"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filters_parse_labels() {
        let query = CageQuery {
            status: Some("available".to_string()),
            cage_type: Some("extra_large".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(CageStatus::Available));
        assert_eq!(filter.cage_type, Some(CageType::ExtraLarge));

        let query = CageQuery {
            cage_type: Some("huge".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_cage_request_validation() {
        let zero_rate = CageRequest {
            daily_rate: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert!(matches!(zero_rate.into_changes(), Err(AppError::BadRequest(_))));

        let sub_cent_rate = CageRequest {
            daily_rate: Some(Decimal::new(1, 3)),
            ..Default::default()
        };
        assert!(matches!(sub_cent_rate.into_changes(), Err(AppError::BadRequest(_))));

        let no_capacity = CageRequest {
            capacity: Some(0),
            ..Default::default()
        };
        assert!(no_capacity.into_changes().is_err());

        let occupied = CageRequest {
            status: Some("occupied".to_string()),
            ..Default::default()
        };
        assert!(occupied.into_changes().is_err());
    }

    #[test]
    fn test_valid_request_converts() {
        let request = CageRequest {
            cage_number: Some(" K-07 ".to_string()),
            cage_type: Some("medium".to_string()),
            daily_rate: Some(Decimal::new(2500, 2)),
            ..Default::default()
        };
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.cage_number.as_deref(), Some("K-07"));
        assert_eq!(changes.cage_type, Some(CageType::Medium));
    }
}
