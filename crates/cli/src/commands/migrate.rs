//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! vc-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time. Already-applied migrations are skipped.

use secrecy::ExposeSecret;
use sqlx::PgPool;

use super::{CommandError, database_url};

/// Apply pending migrations to the clinic database.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to clinic database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running clinic migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Clinic migrations complete");
    Ok(())
}
