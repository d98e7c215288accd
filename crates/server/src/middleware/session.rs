//! Session middleware configuration.
//!
//! Sessions live in `clinic.session` through tower-sessions' `PostgreSQL`
//! store. Cookies are HTTP-only, `SameSite=Lax`, and `Secure` whenever the
//! public base URL is HTTPS.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ClinicConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "vetclinic_session";

/// Idle time after which a session expires (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with the `PostgreSQL` store.
///
/// # Panics
///
/// Panics if the schema or table name is invalid (they are constants).
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ClinicConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("clinic")
        .expect("valid schema name")
        .with_table_name("session")
        .expect("valid table name");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
