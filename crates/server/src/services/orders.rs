//! Shop orders.
//!
//! Creating an order locks every product it touches, so stock checks and
//! decrements cannot interleave with another checkout.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};

use vetclinic_core::{OrderId, OrderStatus, ProductId};

use crate::db::orders;
use crate::db::transactions::{self, Payable};
use crate::error::AppError;
use crate::models::{CurrentUser, Order};

/// One requested line of an order.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Validate and merge requested lines, summing duplicates per product.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an empty order or a non-positive
/// quantity.
pub fn merge_lines(lines: &[LineRequest]) -> Result<BTreeMap<ProductId, i32>, AppError> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("Order must contain at least one item".to_string()));
    }
    let mut merged = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
        }
        let entry = merged.entry(line.product_id).or_insert(0i32);
        *entry = entry
            .checked_add(line.quantity)
            .ok_or_else(|| AppError::BadRequest("Quantity is too large".to_string()))?;
    }
    Ok(merged)
}

/// Place an order for the caller.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for unknown products or insufficient
/// stock; nothing is written in that case.
#[instrument(skip(pool, caller, lines, shipping_address, notes), fields(caller_id = %caller.id))]
pub async fn place_order(
    pool: &PgPool,
    caller: &CurrentUser,
    lines: &[LineRequest],
    shipping_address: Option<&str>,
    notes: Option<&str>,
) -> Result<Order, AppError> {
    let merged = merge_lines(lines)?;
    let ids: Vec<ProductId> = merged.keys().copied().collect();

    let mut tx = pool.begin().await?;
    let products = orders::lock_products(&mut tx, &ids).await?;
    if products.len() != ids.len() {
        return Err(AppError::BadRequest("One or more products are unavailable".to_string()));
    }

    let mut total = Decimal::ZERO;
    for product in &products {
        let quantity = merged.get(&product.id).copied().unwrap_or_default();
        if product.stock < quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {} ({} left)",
                product.name, product.stock
            )));
        }
        total += product.price * Decimal::from(quantity);
    }

    let order = orders::insert(&mut tx, caller.id, total, shipping_address, notes).await?;
    for product in &products {
        let quantity = merged.get(&product.id).copied().unwrap_or_default();
        orders::insert_item(&mut tx, order.id, product.id, quantity, product.price).await?;
        orders::adjust_stock(&mut tx, product.id, -quantity).await?;
    }
    transactions::insert_pending(&mut tx, caller.id, Payable::Order(order.id), total).await?;
    tx.commit().await?;

    info!(order_id = %order.id, items = products.len(), %total, "Order placed");
    Ok(order)
}

/// Cancel an order and put its stock back.
///
/// Clients may cancel their own pending orders; staff may cancel any order
/// that is not already cancelled.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for someone else's order and
/// `AppError::BadRequest` when the order can no longer be cancelled.
#[instrument(skip(pool, caller), fields(caller_id = %caller.id))]
pub async fn cancel_order(
    pool: &PgPool,
    caller: &CurrentUser,
    id: OrderId,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;
    let order = orders::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    if !caller.can_access(order.user_id) {
        return Err(AppError::Forbidden("Not your order".to_string()));
    }
    let cancellable = match order.status {
        OrderStatus::Cancelled => false,
        OrderStatus::Pending => true,
        OrderStatus::Confirmed => caller.is_staff(),
    };
    if !cancellable {
        return Err(AppError::BadRequest(format!(
            "Cannot cancel a {} order",
            order.status
        )));
    }

    let lines = orders::item_quantities(&mut tx, id).await?;
    let mut product_ids: Vec<ProductId> = lines.iter().map(|(product, _)| *product).collect();
    product_ids.dedup();
    orders::lock_products(&mut tx, &product_ids).await?;
    for (product, quantity) in &lines {
        orders::adjust_stock(&mut tx, *product, *quantity).await?;
    }
    orders::set_status(&mut tx, id, OrderStatus::Cancelled).await?;
    transactions::cancel_pending(&mut tx, Payable::Order(id)).await?;

    let updated = orders::lock(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    tx.commit().await?;

    info!(order_id = %id, restocked = lines.len(), "Order cancelled");
    Ok(updated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: i32) -> LineRequest {
        LineRequest {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_merge_sums_duplicates() {
        let merged = merge_lines(&[line(3, 1), line(1, 2), line(3, 4)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&ProductId::new(3)], 5);
        assert_eq!(merged[&ProductId::new(1)], 2);
    }

    #[test]
    fn test_merge_rejects_empty_and_zero_quantity() {
        assert!(matches!(merge_lines(&[]), Err(AppError::BadRequest(_))));
        assert!(matches!(
            merge_lines(&[line(1, 0)]),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            merge_lines(&[line(1, -2)]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_merge_rejects_overflow() {
        assert!(merge_lines(&[line(1, i32::MAX), line(1, 1)]).is_err());
    }
}
