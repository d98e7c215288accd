//! Router-level tests driven with `oneshot`.
//!
//! The pool connects lazily to an address nothing listens on, so these only
//! cover paths that never need the database: health, routing, auth
//! rejections and middleware.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use vetclinic_integration_tests::lazy_state;
use vetclinic_server::middleware::REQUEST_ID_HEADER;

async fn send(request: Request<Body>) -> axum::response::Response {
    vetclinic_server::app(lazy_state())
        .oneshot(request)
        .await
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_does_not_need_the_database() {
    let response = send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn readiness_reports_unreachable_database() {
    let response = send(get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    for uri in [
        "/api/auth/me",
        "/api/pets",
        "/api/cages",
        "/api/appointments",
        "/api/orders",
        "/api/notifications",
        "/api/transactions",
        "/api/dashboard",
        "/api/users",
        "/api/profile",
    ] {
        let response = send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn auth_rejections_use_the_error_envelope() {
    let response = send(get("/api/appointments/1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn staff_actions_reject_anonymous_callers_before_reading_the_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/appointments/5/receipt/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"approved":true}"#))
        .unwrap();
    assert_eq!(send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = send(get("/api/kennels")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_rejected() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/auth/login")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        send(request).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn request_id_is_generated_when_missing() {
    let response = send(get("/health")).await;
    let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert_eq!(id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn upstream_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "edge-7f3a")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "edge-7f3a"
    );
}
