//! Catalog route handlers: clinic services, categories and products.
//!
//! Reads are public; writes need an admin.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use vetclinic_core::{CategoryId, ProductId, ServiceId, non_negative};

use crate::db::catalog::{ProductFields, ProductFilter, ServiceFields};
use crate::db::{CategoryRepository, ProductRepository, ServiceRepository};
use crate::error::AppError;
use crate::middleware::{AdminOnly, Authorized, MaybeUser};
use crate::models::{Category, ClinicService, Product};
use crate::routes::ActionResponse;
use crate::services::{UploadKind, UploadStore};
use crate::state::AppState;

fn required_name(name: Option<&str>) -> Result<&str, AppError> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Name is required".to_string()))
}

// =============================================================================
// Services
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ServiceQuery {
    /// Staff see inactive services too unless `active=true`.
    pub active: Option<bool>,
}

/// GET /api/services
#[instrument(skip(state, caller))]
pub async fn list_services(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    Query(query): Query<ServiceQuery>,
) -> Result<Json<Vec<ClinicService>>, AppError> {
    let is_staff = caller.as_ref().is_some_and(|c| c.is_staff());
    let include_inactive = is_staff && query.active != Some(true);
    let services = ServiceRepository::new(state.pool())
        .list(include_inactive)
        .await?;
    Ok(Json(services))
}

/// GET /api/services/{id}
pub async fn show_service(
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
) -> Result<Json<ClinicService>, AppError> {
    let service = ServiceRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Service".to_string()))?;
    Ok(Json(service))
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub duration_minutes: Option<i32>,
    pub is_boarding: Option<bool>,
    pub is_active: Option<bool>,
}

impl ServiceRequest {
    fn into_fields(self) -> Result<ServiceFields, AppError> {
        if self.duration_minutes.is_some_and(|d| d <= 0) {
            return Err(AppError::BadRequest(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        Ok(ServiceFields {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            price: self.price.map(non_negative).transpose()?,
            duration_minutes: self.duration_minutes,
            is_boarding: self.is_boarding,
            is_active: self.is_active,
        })
    }
}

/// POST /api/services
#[instrument(skip(state, _admin, request))]
pub async fn create_service(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Json(request): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<ClinicService>), AppError> {
    let fields = request.into_fields()?;
    let name = required_name(fields.name.as_deref())?;
    let price = fields
        .price
        .ok_or_else(|| AppError::BadRequest("Price is required".to_string()))?;

    let service = ServiceRepository::new(state.pool())
        .create(name, price, &fields)
        .await?;

    info!(service_id = %service.id, name = %service.name, "Service created");
    Ok((StatusCode::CREATED, Json(service)))
}

/// PUT /api/services/{id}
#[instrument(skip(state, _admin, request))]
pub async fn update_service(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<ServiceId>,
    Json(request): Json<ServiceRequest>,
) -> Result<Json<ClinicService>, AppError> {
    let fields = request.into_fields()?;
    if fields.name.is_some() {
        required_name(fields.name.as_deref())?;
    }
    let service = ServiceRepository::new(state.pool())
        .update(id, &fields)
        .await?;
    Ok(Json(service))
}

/// DELETE /api/services/{id}
#[instrument(skip(state, _admin))]
pub async fn delete_service(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<ServiceId>,
) -> Result<Json<ActionResponse>, AppError> {
    let removed = ServiceRepository::new(state.pool()).delete(id).await?;
    if removed {
        info!(service_id = %id, "Service deleted");
        Ok(ActionResponse::ok("Service deleted"))
    } else {
        info!(service_id = %id, "Service in use, deactivated");
        Ok(ActionResponse::ok(
            "Service has appointments and was deactivated instead",
        ))
    }
}

// =============================================================================
// Categories
// =============================================================================

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// POST /api/categories
#[instrument(skip(state, _admin, request))]
pub async fn create_category(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Json(request): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let name = required_name(request.name.as_deref())?;
    let category = CategoryRepository::new(state.pool())
        .create(name, request.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
#[instrument(skip(state, _admin, request))]
pub async fn update_category(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<CategoryId>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let name = request
        .name
        .as_deref()
        .map(|n| required_name(Some(n)))
        .transpose()?;
    let category = CategoryRepository::new(state.pool())
        .update(id, name, request.description.as_deref())
        .await?;
    Ok(Json(category))
}

/// DELETE /api/categories/{id}
#[instrument(skip(state, _admin))]
pub async fn delete_category(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<CategoryId>,
) -> Result<Json<ActionResponse>, AppError> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(ActionResponse::ok("Category deleted"))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
}

/// GET /api/products
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = ProductRepository::new(state.pool())
        .list(&ProductFilter {
            search: query.search,
            category: query.category,
        })
        .await?;
    Ok(Json(products))
}

/// GET /api/products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

impl ProductRequest {
    fn into_fields(self) -> Result<ProductFields, AppError> {
        if self.stock.is_some_and(|s| s < 0) {
            return Err(AppError::BadRequest("Stock cannot be negative".to_string()));
        }
        Ok(ProductFields {
            category_id: self.category_id,
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            price: self.price.map(non_negative).transpose()?,
            stock: self.stock,
        })
    }
}

/// POST /api/products
#[instrument(skip(state, _admin, request))]
pub async fn create_product(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Json(request): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let fields = request.into_fields()?;
    let name = required_name(fields.name.as_deref())?;
    let price = fields
        .price
        .ok_or_else(|| AppError::BadRequest("Price is required".to_string()))?;

    let product = ProductRepository::new(state.pool())
        .create(name, price, &fields)
        .await?;

    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
#[instrument(skip(state, _admin, request))]
pub async fn update_product(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<ProductId>,
    Json(request): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    let fields = request.into_fields()?;
    if fields.name.is_some() {
        required_name(fields.name.as_deref())?;
    }
    let product = ProductRepository::new(state.pool())
        .update(id, &fields)
        .await?;
    Ok(Json(product))
}

/// Soft delete: the product disappears from the shop but order history keeps it.
///
/// DELETE /api/products/{id}
#[instrument(skip(state, _admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<ProductId>,
) -> Result<Json<ActionResponse>, AppError> {
    ProductRepository::new(state.pool()).soft_delete(id).await?;
    info!(product_id = %id, "Product deleted");
    Ok(ActionResponse::ok("Product deleted"))
}

/// POST /api/products/{id}/image
#[instrument(skip(state, _admin, multipart))]
pub async fn upload_product_image(
    State(state): State<AppState>,
    Authorized(_admin, _): Authorized<AdminOnly>,
    Path(id): Path<ProductId>,
    mut multipart: Multipart,
) -> Result<Json<Product>, AppError> {
    let products = ProductRepository::new(state.pool());
    let previous = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?
        .image_url;

    let file = UploadStore::receive_one(&mut multipart, UploadKind::ProductImage, "image").await?;
    let url = state.uploads().save(UploadKind::ProductImage, &file).await?;
    if let Err(err) = products.set_image_url(id, &url).await {
        state.uploads().discard(&url).await;
        return Err(err.into());
    }
    if let Some(previous) = previous {
        state.uploads().discard(&previous).await;
    }

    let product = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name() {
        assert_eq!(required_name(Some("  Grooming ")).unwrap(), "Grooming");
        assert!(required_name(Some("   ")).is_err());
        assert!(required_name(None).is_err());
    }

    #[test]
    fn test_service_request_validation() {
        let request = ServiceRequest {
            price: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(request.into_fields().is_err());

        let request = ServiceRequest {
            duration_minutes: Some(0),
            ..Default::default()
        };
        assert!(request.into_fields().is_err());

        let request = ServiceRequest {
            price: Some(Decimal::new(1, 3)),
            ..Default::default()
        };
        assert!(matches!(request.into_fields(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_product_stock_cannot_be_negative() {
        let request = ProductRequest {
            stock: Some(-3),
            ..Default::default()
        };
        assert!(matches!(request.into_fields(), Err(AppError::BadRequest(_))));
    }
}
