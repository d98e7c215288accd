//! Order repository.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use vetclinic_core::{OrderId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.status, o.total_amount, o.shipping_address, \
                             o.notes, o.receipt_url, o.receipt_verified, o.receipt_verified_at, \
                             o.receipt_verified_by, o.created_at, o.updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderFilter {
    pub owner: Option<UserId>,
    pub status: Option<OrderStatus>,
}

/// A product row locked for purchase.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM clinic.customer_order o WHERE TRUE"
        ));
        if let Some(owner) = filter.owner {
            query.push(" AND o.user_id = ").push_bind(owner);
        }
        if let Some(status) = filter.status {
            query.push(" AND o.status = ").push_bind(status);
        }
        query.push(" ORDER BY o.created_at DESC, o.id DESC");

        Ok(query.build_query_as::<Order>().fetch_all(self.pool).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM clinic.customer_order o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT i.id, i.order_id, i.product_id, p.name AS product_name,
                   i.quantity, i.unit_price
            FROM clinic.order_item i
            JOIN clinic.product p ON p.id = i.product_id
            WHERE i.order_id = $1
            ORDER BY i.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Lock the purchasable products in `ids`, in id order to avoid deadlocks.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let products = sqlx::query_as::<_, LockedProduct>(
        r"
        SELECT id, name, price, stock
        FROM clinic.product
        WHERE id = ANY($1) AND NOT is_deleted
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(raw)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

/// Move stock by `delta` (negative to sell, positive to restock).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn adjust_stock(
    conn: &mut PgConnection,
    product: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE clinic.product SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(product)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    user: UserId,
    total: Decimal,
    shipping_address: Option<&str>,
    notes: Option<&str>,
) -> Result<Order, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO clinic.customer_order AS o (user_id, total_amount, shipping_address, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user)
    .bind(total)
    .bind(shipping_address)
    .bind(notes)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order: OrderId,
    product: ProductId,
    quantity: i32,
    unit_price: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO clinic.order_item (order_id, product_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(order)
    .bind(product)
    .bind(quantity)
    .bind(unit_price)
    .execute(conn)
    .await?;
    Ok(())
}

/// Product and quantity of every line of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn item_quantities(
    conn: &mut PgConnection,
    order: OrderId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows = sqlx::query_as::<_, (ProductId, i32)>(
        "SELECT product_id, quantity FROM clinic.order_item WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(order)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM clinic.customer_order o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE clinic.customer_order SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Attach a new payment receipt, discarding any earlier verification.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn attach_receipt(
    conn: &mut PgConnection,
    id: OrderId,
    url: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.customer_order
        SET receipt_url = $2, receipt_verified = FALSE,
            receipt_verified_at = NULL, receipt_verified_by = NULL, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(url)
    .execute(conn)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn record_receipt_review(
    conn: &mut PgConnection,
    id: OrderId,
    approved: bool,
    verifier: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.customer_order
        SET receipt_verified = $2,
            receipt_verified_at = CASE WHEN $2 THEN NOW() END,
            receipt_verified_by = CASE WHEN $2 THEN $3 END,
            status = $4,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(approved)
    .bind(verifier)
    .bind(OrderStatus::after_receipt_review(approved))
    .execute(conn)
    .await?;
    Ok(())
}
