//! Shop order route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use vetclinic_core::{OrderId, OrderStatus, ProductId};

use crate::db::OrderRepository;
use crate::db::orders::OrderFilter;
use crate::error::AppError;
use crate::middleware::{AnyUser, Authorized, Staff};
use crate::models::{CurrentUser, Order, OrderItem};
use crate::services::orders::{self, LineRequest};
use crate::services::{UploadKind, UploadStore, verification};
use crate::state::AppState;

/// An order with its line items.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

async fn accessible(
    state: &AppState,
    caller: &CurrentUser,
    id: OrderId,
) -> Result<Order, AppError> {
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    if !caller.can_access(order.user_id) {
        return Err(AppError::Forbidden("Not your order".to_string()));
    }
    Ok(order)
}

async fn with_items(state: &AppState, order: Order) -> Result<OrderDetail, AppError> {
    let items = OrderRepository::new(state.pool()).items(order.id).await?;
    Ok(OrderDetail { order, items })
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
}

/// GET /api/orders
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn index(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let orders = OrderRepository::new(state.pool())
        .list(OrderFilter {
            owner: (!caller.is_staff()).then_some(caller.id),
            status,
        })
        .await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn show(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let order = accessible(&state, &caller, id).await?;
    Ok(Json(with_items(&state, order).await?))
}

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    fn lines(&self) -> Vec<LineRequest> {
        self.items
            .iter()
            .map(|line| LineRequest {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect()
    }
}

/// Place an order. Stock is reserved immediately.
///
/// POST /api/orders
#[instrument(skip(state, caller, request), fields(user_id = %caller.id, lines = request.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let order = orders::place_order(
        state.pool(),
        &caller,
        &request.lines(),
        request.shipping_address.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        request.notes.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(with_items(&state, order).await?)))
}

/// Cancel an order and put its items back in stock.
///
/// POST /api/orders/{id}/cancel
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn cancel(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(orders::cancel_order(state.pool(), &caller, id).await?))
}

/// POST /api/orders/{id}/receipt
#[instrument(skip(state, caller, multipart), fields(user_id = %caller.id))]
pub async fn upload_receipt(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AnyUser>,
    Path(id): Path<OrderId>,
    mut multipart: Multipart,
) -> Result<Json<Order>, AppError> {
    let order = accessible(&state, &caller, id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cannot upload a receipt for a cancelled order".to_string(),
        ));
    }
    let file = UploadStore::receive_one(&mut multipart, UploadKind::Receipt, "file").await?;
    let url = state.uploads().save(UploadKind::Receipt, &file).await?;

    match verification::attach_order_receipt(state.pool(), id, &caller, &url).await {
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

/// POST /api/orders/{id}/receipt/verify
#[instrument(skip(state, reviewer, request), fields(reviewer_id = %reviewer.id))]
pub async fn verify_receipt(
    State(state): State<AppState>,
    Authorized(reviewer, _): Authorized<Staff>,
    Path(id): Path<OrderId>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Order>, AppError> {
    let order = verification::review_order_receipt(
        state.pool(),
        &state.config().base_url,
        id,
        request.approved,
        &reviewer,
    )
    .await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_keeps_duplicate_lines_for_merging() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{"items":[{"product_id":3,"quantity":1},{"product_id":3,"quantity":2}]}"#,
        )
        .unwrap();
        let lines = request.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].quantity, 2);
        assert!(request.shipping_address.is_none());
    }
}
