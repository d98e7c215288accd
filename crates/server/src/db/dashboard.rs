//! Aggregate counts for the staff dashboard.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// Products at or below this stock level are reported as low.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub total_clients: i64,
    pub total_pets: i64,
    pub appointments_today: i64,
    pub pending_appointments: i64,
    pub receipts_awaiting_review: i64,
    pub boarded_pets: i64,
    pub available_cages: i64,
    pub pending_orders: i64,
    pub low_stock_products: i64,
    pub completed_revenue: Decimal,
}

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self, today: NaiveDate) -> Result<DashboardStats, RepositoryError> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM clinic.user WHERE role = 'client') AS total_clients,
                (SELECT COUNT(*) FROM clinic.pet) AS total_pets,
                (SELECT COUNT(*) FROM clinic.appointment
                 WHERE appointment_date = $1 AND status <> 'cancelled') AS appointments_today,
                (SELECT COUNT(*) FROM clinic.appointment
                 WHERE status IN ('pending', 'pending payment')) AS pending_appointments,
                (SELECT COUNT(*) FROM clinic.appointment
                 WHERE receipt_url IS NOT NULL AND NOT receipt_verified
                   AND status = 'pending payment')
                + (SELECT COUNT(*) FROM clinic.customer_order
                   WHERE receipt_url IS NOT NULL AND NOT receipt_verified
                     AND status = 'pending') AS receipts_awaiting_review,
                (SELECT COUNT(*) FROM clinic.cage_reservation
                 WHERE status = 'checked_in') AS boarded_pets,
                (SELECT COUNT(*) FROM clinic.cage WHERE status = 'available') AS available_cages,
                (SELECT COUNT(*) FROM clinic.customer_order WHERE status = 'pending') AS pending_orders,
                (SELECT COUNT(*) FROM clinic.product
                 WHERE NOT is_deleted AND stock <= $2) AS low_stock_products,
                (SELECT COALESCE(SUM(amount), 0) FROM clinic.transaction
                 WHERE status = 'completed') AS completed_revenue
            ",
        )
        .bind(today)
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }
}
