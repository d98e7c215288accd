//! Vet clinic API server library.
//!
//! The binary in `main.rs` only wires configuration, tracing and the
//! listener; everything else lives here so it can be tested.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::services::uploads::{MAX_UPLOAD_BYTES, PUBLIC_PREFIX};
use crate::state::AppState;

/// Room for multipart framing and text fields around the largest file.
const BODY_LIMIT_BYTES: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Build the complete application: routes, uploaded files and middleware.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let uploads = ServeDir::new(state.uploads().root());

    routes::routes(state.config())
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ClinicConfig;

    fn state() -> AppState {
        let url = "postgres://clinic@127.0.0.1:1/clinic";
        let config = ClinicConfig {
            database_url: SecretString::from(url),
            host: std::net::IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: "http://clinic.test".to_string(),
            upload_dir: std::env::temp_dir().join("vetclinic-unit-uploads"),
            trust_proxy_headers: false,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new().connect_lazy(url).unwrap();
        AppState::new(config, pool)
    }

    #[tokio::test]
    async fn test_missing_upload_is_not_found() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .uri("/uploads/receipts/does-not-exist.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_category_writes_require_login() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/categories")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"Toys"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
