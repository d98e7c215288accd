//! Pet route handlers.
//!
//! Clients see and change only their own pets; staff see all of them.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use vetclinic_core::{PetId, UserId, non_negative};

use crate::db::PetRepository;
use crate::db::pets::{PetFields, PetFilter};
use crate::error::AppError;
use crate::middleware::{AnyUser, Authorized};
use crate::models::{CurrentUser, Pet};
use crate::routes::ActionResponse;
use crate::services::{UploadKind, UploadStore};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PetQuery {
    pub search: Option<String>,
    pub species: Option<String>,
}

/// Load a pet the caller may act on.
async fn owned_pet(state: &AppState, caller: &CurrentUser, id: PetId) -> Result<Pet, AppError> {
    let pet = PetRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet".to_string()))?;
    if !caller.can_access(pet.owner_id) {
        return Err(AppError::Forbidden("Not your pet".to_string()));
    }
    Ok(pet)
}

/// GET /api/pets
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Query(query): Query<PetQuery>,
) -> Result<Json<Vec<Pet>>, AppError> {
    let pets = PetRepository::new(state.pool())
        .list(&PetFilter {
            owner: (!caller.is_staff()).then_some(caller.id),
            search: query.search,
            species: query.species,
        })
        .await?;
    Ok(Json(pets))
}

/// GET /api/pets/{id}
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<PetId>,
) -> Result<Json<Pet>, AppError> {
    Ok(Json(owned_pet(&state, &caller, id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PetRequest {
    /// Staff may register a pet for a client; ignored for clients.
    pub owner_id: Option<UserId>,
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight_kg: Option<Decimal>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

/// Upper bound of the `NUMERIC(6, 2)` weight column.
fn max_weight_kg() -> Decimal {
    Decimal::new(999_999, 2)
}

impl PetRequest {
    fn into_fields(self) -> Result<PetFields, AppError> {
        let weight_kg = self.weight_kg.map(non_negative).transpose()?;
        if weight_kg.is_some_and(|w| w > max_weight_kg()) {
            return Err(AppError::BadRequest(format!(
                "Weight cannot exceed {} kg",
                max_weight_kg()
            )));
        }
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());
        let fields = PetFields {
            name: trimmed(self.name),
            species: trimmed(self.species),
            breed: self.breed,
            birth_date: self.birth_date,
            weight_kg,
            gender: self.gender,
            notes: self.notes,
        };
        if fields.name.as_deref().is_some_and(str::is_empty)
            || fields.species.as_deref().is_some_and(str::is_empty)
        {
            return Err(AppError::BadRequest("Name and species cannot be empty".to_string()));
        }
        Ok(fields)
    }
}

/// POST /api/pets
#[instrument(skip(state, caller, request), fields(user_id = %caller.id))]
pub async fn create(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Json(request): Json<PetRequest>,
) -> Result<(StatusCode, Json<Pet>), AppError> {
    let owner = match request.owner_id {
        Some(owner) if caller.is_staff() => owner,
        _ => caller.id,
    };
    let fields = request.into_fields()?;
    let (Some(name), Some(species)) = (fields.name.as_deref(), fields.species.as_deref()) else {
        return Err(AppError::BadRequest("Name and species are required".to_string()));
    };

    let pet = PetRepository::new(state.pool())
        .create(owner, name, species, &fields)
        .await?;

    info!(pet_id = %pet.id, owner_id = %owner, "Pet registered");
    Ok((StatusCode::CREATED, Json(pet)))
}

/// PUT /api/pets/{id}
#[instrument(skip(state, caller, request), fields(user_id = %caller.id))]
pub async fn update(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<PetId>,
    Json(request): Json<PetRequest>,
) -> Result<Json<Pet>, AppError> {
    owned_pet(&state, &caller, id).await?;
    let fields = request.into_fields()?;
    let pet = PetRepository::new(state.pool()).update(id, &fields).await?;
    Ok(Json(pet))
}

/// DELETE /api/pets/{id}
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<PetId>,
) -> Result<Json<ActionResponse>, AppError> {
    owned_pet(&state, &caller, id).await?;
    PetRepository::new(state.pool()).delete(id).await?;

    info!(pet_id = %id, "Pet deleted");
    Ok(ActionResponse::ok("Pet deleted"))
}

/// Upload a pet photo (multipart field `image`).
///
/// POST /api/pets/{id}/image
#[instrument(skip(state, caller, multipart), fields(user_id = %caller.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<PetId>,
    mut multipart: Multipart,
) -> Result<Json<Pet>, AppError> {
    let previous = owned_pet(&state, &caller, id).await?.image_url;
    let file = UploadStore::receive_one(&mut multipart, UploadKind::PetImage, "image").await?;
    let url = state.uploads().save(UploadKind::PetImage, &file).await?;

    let pets = PetRepository::new(state.pool());
    if let Err(err) = pets.set_image_url(id, &url).await {
        state.uploads().discard(&url).await;
        return Err(err.into());
    }
    if let Some(previous) = previous {
        state.uploads().discard(&previous).await;
    }
    let pet = pets
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet".to_string()))?;
    Ok(Json(pet))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_weight_rejected() {
        let request = PetRequest {
            weight_kg: Some(Decimal::new(-15, 1)),
            ..Default::default()
        };
        assert!(matches!(request.into_fields(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_weight_must_fit_column() {
        let request = PetRequest {
            weight_kg: Some(Decimal::new(10_000, 0)),
            ..Default::default()
        };
        assert!(matches!(request.into_fields(), Err(AppError::BadRequest(_))));

        let request = PetRequest {
            weight_kg: Some(Decimal::new(4_255, 3)),
            ..Default::default()
        };
        assert!(matches!(request.into_fields(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_names_are_trimmed() {
        let request = PetRequest {
            name: Some("  Biscuit ".to_string()),
            species: Some("dog".to_string()),
            ..Default::default()
        };
        let fields = request.into_fields().unwrap();
        assert_eq!(fields.name.as_deref(), Some("Biscuit"));
    }
}
