//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::ClinicConfig;
use crate::db::dashboard::DashboardStats;
use crate::services::UploadStore;

/// How long dashboard aggregates are served from memory.
const DASHBOARD_CACHE_TTL: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClinicConfig,
    pool: PgPool,
    uploads: UploadStore,
    dashboard: Cache<(), DashboardStats>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ClinicConfig, pool: PgPool) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone());
        let dashboard = Cache::builder()
            .max_capacity(1)
            .time_to_live(DASHBOARD_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                uploads,
                dashboard,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClinicConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    /// Dashboard aggregates, keyed by `()` since there is a single entry.
    #[must_use]
    pub fn dashboard_cache(&self) -> &Cache<(), DashboardStats> {
        &self.inner.dashboard
    }
}
