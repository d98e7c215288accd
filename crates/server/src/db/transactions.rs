//! Payment ledger repository.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use vetclinic_core::{AppointmentId, OrderId, TransactionId, TransactionStatus, UserId};

use super::RepositoryError;
use crate::models::Transaction;

const TRANSACTION_COLUMNS: &str = "id, user_id, appointment_id, order_id, amount, \
                                   payment_method, status, created_at, updated_at";

/// What a ledger row pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payable {
    Appointment(AppointmentId),
    Order(OrderId),
}

pub struct TransactionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM clinic.transaction WHERE TRUE"
        ));
        if let Some(status) = status {
            query.push(" AND status = ").push_bind(status);
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        Ok(query
            .build_query_as::<Transaction>()
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepositoryError> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM clinic.transaction WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(transaction)
    }
}

/// Record a pending payment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_pending(
    conn: &mut PgConnection,
    user: UserId,
    payable: Payable,
    amount: Decimal,
) -> Result<TransactionId, RepositoryError> {
    let (appointment, order) = match payable {
        Payable::Appointment(id) => (Some(id), None),
        Payable::Order(id) => (None, Some(id)),
    };
    let id = sqlx::query_scalar::<_, TransactionId>(
        r"
        INSERT INTO clinic.transaction (user_id, appointment_id, order_id, amount)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(user)
    .bind(appointment)
    .bind(order)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Mark every ledger row of `payable` completed. Voided rows stay voided.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn complete(conn: &mut PgConnection, payable: Payable) -> Result<u64, RepositoryError> {
    set_status_where(conn, payable, TransactionStatus::Completed, "status <> 'cancelled'").await
}

/// Void the unpaid ledger rows of a cancelled appointment or order.
///
/// Completed rows are left alone: money already received is not a
/// receivable.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn cancel_pending(
    conn: &mut PgConnection,
    payable: Payable,
) -> Result<u64, RepositoryError> {
    set_status_where(conn, payable, TransactionStatus::Cancelled, "status = 'pending'").await
}

async fn set_status_where(
    conn: &mut PgConnection,
    payable: Payable,
    status: TransactionStatus,
    guard: &str,
) -> Result<u64, RepositoryError> {
    let (column, id) = match payable {
        Payable::Appointment(id) => ("appointment_id", id.as_i32()),
        Payable::Order(id) => ("order_id", id.as_i32()),
    };
    let result = sqlx::query(&format!(
        "UPDATE clinic.transaction SET status = $2, updated_at = NOW() \
         WHERE {column} = $1 AND {guard}"
    ))
    .bind(id)
    .bind(status)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
