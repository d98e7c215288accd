//! Product orders and the payment ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vetclinic_core::{
    AppointmentId, OrderId, OrderItemId, OrderStatus, ProductId, TransactionId,
    TransactionStatus, UserId,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
    pub receipt_verified: bool,
    pub receipt_verified_at: Option<DateTime<Utc>>,
    pub receipt_verified_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    /// Price at the time of purchase.
    pub unit_price: Decimal,
}

/// Ledger row for exactly one appointment or order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub appointment_id: Option<AppointmentId>,
    pub order_id: Option<OrderId>,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
