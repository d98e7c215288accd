//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness
//! GET  /health/ready                           - Database readiness
//!
//! # Auth
//! POST /api/auth/register                      - Create a client account
//! POST /api/auth/login                         - Start a session
//! POST /api/auth/logout                        - End the session
//! GET  /api/auth/me                            - Current user
//! POST /api/auth/forgot-password               - Email a reset link
//! GET  /api/auth/reset-password/{token}        - Check a reset token
//! POST /api/auth/reset-password                - Consume a token, set a password
//!
//! # Users (admin) and profile
//! GET  /api/users                              - List (search, role)
//! GET|PUT|DELETE /api/users/{id}
//! GET|PUT /api/profile                         - The caller's own account
//!
//! # Pets
//! GET|POST /api/pets                           - List (own / all for staff), create
//! GET|PUT|DELETE /api/pets/{id}
//! POST /api/pets/{id}/image                    - Upload photo (multipart `image`)
//!
//! # Catalog
//! GET|POST /api/services, GET|PUT|DELETE /api/services/{id}
//! GET|POST /api/categories, PUT|DELETE /api/categories/{id}
//! GET|POST /api/products, GET|PUT|DELETE /api/products/{id}
//! POST /api/products/{id}/image
//!
//! # Boarding
//! GET|POST /api/cages                          - Availability listing, create
//! GET|PUT|DELETE /api/cages/{id}
//!
//! # Appointments
//! GET|POST /api/appointments
//! GET  /api/appointments/{id}
//! PUT  /api/appointments/{id}/status           - Staff status change
//! POST /api/appointments/{id}/cancel           - Client cancellation
//! POST /api/appointments/{id}/check-in|check-out
//! POST /api/appointments/{id}/receipt          - Upload receipt (multipart `file`)
//! POST /api/appointments/{id}/receipt/verify   - Staff review
//! POST /api/appointments/{id}/documents        - Upload boarding documents
//! POST /api/appointments/{id}/documents/verify - Staff review
//! POST /api/appointments/{id}/documents/reupload - Reset rejected documents
//!
//! # Orders
//! GET|POST /api/orders, GET /api/orders/{id}
//! POST /api/orders/{id}/cancel
//! POST /api/orders/{id}/receipt, POST /api/orders/{id}/receipt/verify
//!
//! # Ledger, notifications, dashboard
//! GET  /api/transactions, GET /api/transactions/{id}      (staff)
//! GET|POST /api/notifications                  - Own list, staff send
//! POST /api/notifications/{id}/read, POST /api/notifications/read-all
//! DELETE /api/notifications/{id}
//! GET  /api/dashboard                          - Cached aggregates (staff)
//! ```

pub mod appointments;
pub mod auth;
pub mod cages;
pub mod catalog;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod pets;
pub mod transactions;
pub mod users;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::config::ClinicConfig;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Body of action endpoints that return no resource.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Create the auth routes router.
///
/// Endpoints that accept credentials or send reset emails are rate limited.
pub fn auth_routes(config: &ClinicConfig) -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route_layer(auth_rate_limiter(config.trust_proxy_headers));

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/reset-password/{token}", get(auth::validate_reset_token))
        .merge(limited)
}

/// Create the user and profile routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::index))
        .route(
            "/users/{id}",
            get(users::show).put(users::update).delete(users::delete),
        )
        .route("/profile", get(users::profile).put(users::update_profile))
}

/// Create the pet routes router.
pub fn pet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pets::index).post(pets::create))
        .route(
            "/{id}",
            get(pets::show).put(pets::update).delete(pets::delete),
        )
        .route("/{id}/image", post(pets::upload_image))
}

/// Create the catalog routes router (services, categories, products).
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/services",
            get(catalog::list_services).post(catalog::create_service),
        )
        .route(
            "/services/{id}",
            get(catalog::show_service)
                .put(catalog::update_service)
                .delete(catalog::delete_service),
        )
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/products/{id}",
            get(catalog::show_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/products/{id}/image", post(catalog::upload_product_image))
}

/// Create the cage routes router.
pub fn cage_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cages::index).post(cages::create))
        .route(
            "/{id}",
            get(cages::show).put(cages::update).delete(cages::delete),
        )
}

/// Create the appointment routes router.
pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(appointments::index).post(appointments::create))
        .route("/{id}", get(appointments::show))
        .route("/{id}/status", put(appointments::update_status))
        .route("/{id}/cancel", post(appointments::cancel))
        .route("/{id}/check-in", post(appointments::check_in))
        .route("/{id}/check-out", post(appointments::check_out))
        .route("/{id}/receipt", post(appointments::upload_receipt))
        .route("/{id}/receipt/verify", post(appointments::verify_receipt))
        .route("/{id}/documents", post(appointments::upload_documents))
        .route("/{id}/documents/verify", post(appointments::verify_document))
        .route("/{id}/documents/reupload", post(appointments::reupload_documents))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/receipt", post(orders::upload_receipt))
        .route("/{id}/receipt/verify", post(orders::verify_receipt))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::index).post(notifications::send))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", post(notifications::mark_read))
        .route("/{id}", axum::routing::delete(notifications::delete))
}

/// Create all `/api` routes.
pub fn api_routes(config: &ClinicConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(config))
        .merge(user_routes())
        .nest("/pets", pet_routes())
        .merge(catalog_routes())
        .nest("/cages", cage_routes())
        .nest("/appointments", appointment_routes())
        .nest("/orders", order_routes())
        .route("/transactions", get(transactions::index))
        .route("/transactions/{id}", get(transactions::show))
        .nest("/notifications", notification_routes())
        .route("/dashboard", get(dashboard::stats))
}

/// Create every route of the server, without middleware.
pub fn routes(config: &ClinicConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes(config))
}

/// Liveness health check. Does not touch dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness check: 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
