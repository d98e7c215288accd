//! Database operations for the clinic `PostgreSQL` schema.
//!
//! # Schema: `clinic`
//!
//! ## Tables
//!
//! - `user` / `session` / `password_reset` - Accounts, sessions, reset tokens
//! - `pet` - Client pets
//! - `service` / `category` / `product` - Catalog
//! - `cage` / `cage_reservation` - Boarding capacity
//! - `appointment` - Visits and boarding stays with receipts and documents
//! - `customer_order` / `order_item` / `transaction` - Shop orders and ledger
//! - `notification` / `email_outbox` - In-app and email notifications
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p vetclinic-cli -- migrate
//! ```
//!
//! Multi-statement workflows take a `&mut PgConnection` so the caller can
//! run them inside a transaction (`&mut *tx`).

pub mod appointments;
pub mod cages;
pub mod catalog;
pub mod dashboard;
pub mod email_outbox;
pub mod notifications;
pub mod orders;
pub mod password_resets;
pub mod pets;
pub mod transactions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use appointments::AppointmentRepository;
pub use cages::CageRepository;
pub use catalog::{CategoryRepository, ProductRepository, ServiceRepository};
pub use dashboard::DashboardRepository;
pub use email_outbox::EmailOutboxRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use password_resets::PasswordResetRepository;
pub use pets::PetRepository;
pub use transactions::TransactionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn unique_violation(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Connections are pinged before being handed out, so a connection broken by
/// a server restart is replaced instead of failing the request.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .test_before_acquire(true)
        .connect(database_url.expose_secret())
        .await
}
