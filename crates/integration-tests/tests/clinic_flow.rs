//! End-to-end flows against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`vc-cli migrate`)
//! - The server running (`cargo run -p vetclinic-server`)
//! - An admin account in `CLINIC_TEST_ADMIN_EMAIL` / `CLINIC_TEST_ADMIN_PASSWORD`
//!   (create one with `vc-cli staff create -r admin`)
//! - For the reset-token flow, the same database in `CLINIC_TEST_DATABASE_URL`
//!
//! Run with: cargo test -p vetclinic-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Days, Duration, NaiveDate, Utc};
use reqwest::{Client, Response, StatusCode, multipart};
use serde_json::{Value, json};
use uuid::Uuid;

use vetclinic_core::UserId;
use vetclinic_integration_tests::{database_pool, server_url, tiny_png};
use vetclinic_server::db::PasswordResetRepository;
use vetclinic_server::services::password_reset;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

fn url(path: &str) -> String {
    format!("{}{path}", server_url())
}

async fn login(client: &Client, email: &str, password: &str) -> Value {
    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

/// Register a fresh client and return a logged-in HTTP client.
async fn new_client_session() -> (Client, Value) {
    let client = client();
    let email = format!("owner-{}@clinic.test", Uuid::new_v4().simple());
    let password = "correct horse battery";

    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({ "email": email, "password": password, "name": "Test Owner" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let me = login(&client, &email, password).await;
    (client, me)
}

async fn admin_session() -> Client {
    let email = std::env::var("CLINIC_TEST_ADMIN_EMAIL").expect("CLINIC_TEST_ADMIN_EMAIL");
    let password =
        std::env::var("CLINIC_TEST_ADMIN_PASSWORD").expect("CLINIC_TEST_ADMIN_PASSWORD");
    let client = client();
    login(&client, &email, &password).await;
    client
}

async fn create_pet(client: &Client) -> Value {
    let resp = client
        .post(url("/api/pets"))
        .json(&json!({ "name": "Mochi", "species": "cat", "weight_kg": "4.2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

#[tokio::test]
#[ignore = "Requires running clinic server and database"]
async fn test_register_login_logout() {
    let (client, me) = new_client_session().await;
    assert_eq!(me["role"], "client");

    let resp = client.get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running clinic server and database"]
async fn test_clients_only_see_their_own_pets() {
    let (alice, _) = new_client_session().await;
    let (bob, _) = new_client_session().await;
    let pet = create_pet(&alice).await;

    let resp = bob
        .get(url(&format!("/api/pets/{}", pet["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let pets: Vec<Value> = bob.get(url("/api/pets")).send().await.unwrap().json().await.unwrap();
    assert!(pets.iter().all(|p| p["id"] != pet["id"]));
}

#[tokio::test]
#[ignore = "Requires running clinic server and database"]
async fn test_forgot_password_does_not_reveal_accounts() {
    let client = client();
    for email in ["nobody-here@clinic.test", "not-an-email"] {
        let resp = client
            .post(url("/api/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
    }

    let resp = client
        .get(url("/api/auth/reset-password/not-a-real-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

async fn create_boarding_service(admin: &Client) -> Value {
    let resp = admin
        .post(url("/api/services"))
        .json(&json!({
            "name": format!("Boarding {}", Uuid::new_v4().simple()),
            "price": "15.00",
            "is_boarding": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

fn cage_number() -> String {
    format!("T-{}", &Uuid::new_v4().simple().to_string()[..8])
}

async fn create_cage(admin: &Client) -> Value {
    let resp = admin
        .post(url("/api/cages"))
        .json(&json!({ "cage_number": cage_number(), "cage_type": "small", "daily_rate": "30.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn book_stay(
    client: &Client,
    pet: &Value,
    service: &Value,
    cage: &Value,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Response {
    client
        .post(url("/api/appointments"))
        .json(&json!({
            "pet_id": pet["id"],
            "service_id": service["id"],
            "appointment_date": check_in,
            "cage_id": cage["id"],
            "check_in": check_in,
            "check_out": check_out,
        }))
        .send()
        .await
        .unwrap()
}

/// A fresh client with a pending three-night stay in a fresh cage.
struct Stay {
    client: Client,
    cage: Value,
    appointment: Value,
}

async fn booked_stay(admin: &Client) -> Stay {
    let service = create_boarding_service(admin).await;
    let cage = create_cage(admin).await;
    let (client, _) = new_client_session().await;
    let pet = create_pet(&client).await;
    let check_in = Utc::now().date_naive() + Days::new(30);

    let resp = book_stay(&client, &pet, &service, &cage, check_in, check_in + Days::new(3)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let appointment = resp.json().await.unwrap();
    Stay {
        client,
        cage,
        appointment,
    }
}

fn png_form(field: &str) -> multipart::Form {
    multipart::Form::new().part(
        field.to_string(),
        multipart::Part::bytes(tiny_png())
            .file_name(format!("{field}.png"))
            .mime_str("image/png")
            .unwrap(),
    )
}

async fn upload_receipt(client: &Client, id: &Value) -> Response {
    client
        .post(url(&format!("/api/appointments/{id}/receipt")))
        .multipart(png_form("file"))
        .send()
        .await
        .unwrap()
}

async fn review_receipt(admin: &Client, id: &Value, approved: bool) -> Response {
    admin
        .post(url(&format!("/api/appointments/{id}/receipt/verify")))
        .json(&json!({ "approved": approved }))
        .send()
        .await
        .unwrap()
}

async fn get_json(client: &Client, path: &str) -> Value {
    let resp = client.get(url(path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    resp.json().await.unwrap()
}

/// The ledger row for an appointment.
async fn transaction_for(admin: &Client, appointment_id: &Value) -> Value {
    let transactions = get_json(admin, "/api/transactions").await;
    transactions
        .as_array()
        .unwrap()
        .iter()
        .find(|t| &t["appointment_id"] == appointment_id)
        .cloned()
        .expect("appointment has a transaction")
}

async fn set_status(admin: &Client, id: &Value, status: &str) -> Response {
    admin
        .put(url(&format!("/api/appointments/{id}/status")))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

async fn available_cage_ids(
    client: &Client,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Vec<Value> {
    let cages = get_json(
        client,
        &format!("/api/cages?check_in={check_in}&check_out={check_out}"),
    )
    .await;
    cages
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].clone())
        .collect()
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_boarding_booking_and_receipt_verification() {
    let admin = admin_session().await;
    let service = create_boarding_service(&admin).await;
    let cage = create_cage(&admin).await;

    let (client, _) = new_client_session().await;
    let pet = create_pet(&client).await;
    let check_in = Utc::now().date_naive() + Days::new(30);
    let check_out = check_in + Days::new(3);

    let resp = book_stay(&client, &pet, &service, &cage, check_in, check_out).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let appointment: Value = resp.json().await.unwrap();
    assert_eq!(appointment["status"], "pending");
    assert_eq!(appointment["total_amount"], "105.00");

    // The same cage cannot be booked for an overlapping stay.
    let resp = book_stay(
        &client,
        &pet,
        &service,
        &cage,
        check_out,
        check_out + Days::new(2),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let id = &appointment["id"];
    let resp = upload_receipt(&client, id).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded: Value = resp.json().await.unwrap();
    assert_eq!(uploaded["status"], "pending payment");

    // Clients cannot verify their own receipts.
    let resp = review_receipt(&client, id, true).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let verified: Value = review_receipt(&admin, id, true).await.json().await.unwrap();
    assert_eq!(verified["status"], "paid");
    assert_eq!(verified["receipt_verified"], true);

    let notifications: Vec<Value> = client
        .get(url("/api/notifications?unread_only=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(notifications.iter().any(|n| n["kind"] == "payment"));
}

#[tokio::test]
#[ignore = "Requires running clinic server and database"]
async fn test_empty_order_is_rejected() {
    let (client, _) = new_client_session().await;
    let resp = client
        .post(url("/api/orders"))
        .json(&json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_receipt_review_settles_the_ledger() {
    let admin = admin_session().await;
    let stay = booked_stay(&admin).await;
    let id = &stay.appointment["id"];
    assert_eq!(transaction_for(&admin, id).await["status"], "pending");

    assert_eq!(upload_receipt(&stay.client, id).await.status(), StatusCode::OK);
    let rejected: Value = review_receipt(&admin, id, false).await.json().await.unwrap();
    assert_eq!(rejected["status"], "pending payment");
    assert_eq!(rejected["receipt_verified"], false);
    assert_eq!(transaction_for(&admin, id).await["status"], "pending");

    assert_eq!(upload_receipt(&stay.client, id).await.status(), StatusCode::OK);
    let approved: Value = review_receipt(&admin, id, true).await.json().await.unwrap();
    assert_eq!(approved["status"], "paid");
    assert_eq!(transaction_for(&admin, id).await["status"], "completed");
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_rejected_documents_block_receipt_review() {
    let admin = admin_session().await;
    let stay = booked_stay(&admin).await;
    let id = &stay.appointment["id"];

    assert_eq!(upload_receipt(&stay.client, id).await.status(), StatusCode::OK);
    let resp = stay
        .client
        .post(url(&format!("/api/appointments/{id}/documents")))
        .multipart(png_form("boarding_id"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let rejected: Value = admin
        .post(url(&format!("/api/appointments/{id}/documents/verify")))
        .json(&json!({ "document": "id", "approved": false, "reason": "Blurry photo" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rejected["status"], "rejected");

    // Approving the receipt must not skip past the document rejection.
    let resp = review_receipt(&admin, id, true).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = upload_receipt(&stay.client, id).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let current = get_json(&admin, &format!("/api/appointments/{id}")).await;
    assert_eq!(current["status"], "rejected");
    assert_eq!(current["receipt_verified"], false);
    assert_eq!(transaction_for(&admin, id).await["status"], "pending");
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_reupload_requires_rejected_documents() {
    let admin = admin_session().await;
    let stay = booked_stay(&admin).await;
    let id = &stay.appointment["id"];

    let resp = stay
        .client
        .post(url(&format!("/api/appointments/{id}/documents")))
        .multipart(png_form("boarding_signature"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let before: Value = resp.json().await.unwrap();

    let resp = stay
        .client
        .post(url(&format!("/api/appointments/{id}/documents/reupload")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let after = get_json(&stay.client, &format!("/api/appointments/{id}")).await;
    assert_eq!(after["status"], "pending");
    assert_eq!(after["boarding_signature_url"], before["boarding_signature_url"]);
    assert_eq!(after["boarding_signature_verified"], Value::Null);
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_cage_numbers_are_unique() {
    let admin = admin_session().await;
    let number = cage_number();
    let body = json!({ "cage_number": number, "cage_type": "medium", "daily_rate": "25.00" });

    let resp = admin.post(url("/api/cages")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = admin.post(url("/api/cages")).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let cages = get_json(&admin, "/api/cages").await;
    let matching = cages
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["cage_number"] == number.as_str())
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_cage_rates_must_fit_in_cents() {
    let admin = admin_session().await;
    let resp = admin
        .post(url("/api/cages"))
        .json(&json!({ "cage_number": cage_number(), "cage_type": "small", "daily_rate": "10.005" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let cage = create_cage(&admin).await;
    let resp = admin
        .put(url(&format!("/api/cages/{}", cage["id"])))
        .json(&json!({ "daily_rate": "0.001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let unchanged = get_json(&admin, &format!("/api/cages/{}", cage["id"])).await;
    assert_eq!(unchanged["daily_rate"], "30.00");
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_cages_in_use_cannot_be_deleted() {
    let admin = admin_session().await;

    let idle = create_cage(&admin).await;
    let resp = admin
        .delete(url(&format!("/api/cages/{}", idle["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = admin
        .get(url(&format!("/api/cages/{}", idle["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let stay = booked_stay(&admin).await;
    let cage_path = format!("/api/cages/{}", stay.cage["id"]);
    let resp = admin.delete(url(&cage_path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let id = &stay.appointment["id"];
    let resp = admin
        .post(url(&format!("/api/appointments/{id}/check-in")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = admin.delete(url(&cage_path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get_json(&admin, &cage_path).await["status"], "occupied");
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_availability_treats_stays_as_inclusive() {
    let admin = admin_session().await;
    let service = create_boarding_service(&admin).await;
    let cage = create_cage(&admin).await;
    let (client, _) = new_client_session().await;
    let pet = create_pet(&client).await;

    let arrive = Utc::now().date_naive() + Days::new(400);
    let leave = arrive + Days::new(5);
    let resp = book_stay(&client, &pet, &service, &cage, arrive, leave).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let until = leave + Days::new(5);
    let overlapping = available_cage_ids(&client, arrive + Days::new(2), until).await;
    assert!(!overlapping.contains(&cage["id"]));
    let sharing_last_day = available_cage_ids(&client, leave, until).await;
    assert!(!sharing_last_day.contains(&cage["id"]));
    let after = available_cage_ids(&client, leave + Days::new(1), until).await;
    assert!(after.contains(&cage["id"]));
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_completing_a_stay_frees_the_cage() {
    let admin = admin_session().await;
    let stay = booked_stay(&admin).await;
    let id = &stay.appointment["id"];
    let cage_path = format!("/api/cages/{}", stay.cage["id"]);

    // A stay that never started cannot be completed.
    assert_eq!(set_status(&admin, id, "confirmed").await.status(), StatusCode::OK);
    assert_eq!(set_status(&admin, id, "completed").await.status(), StatusCode::BAD_REQUEST);

    let resp = admin
        .post(url(&format!("/api/appointments/{id}/check-in")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(get_json(&admin, &cage_path).await["status"], "occupied");

    let resp = set_status(&admin, id, "completed").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let completed: Value = resp.json().await.unwrap();
    assert_eq!(completed["status"], "completed");

    let cage = get_json(&admin, &cage_path).await;
    assert_eq!(cage["status"], "available");
    assert_eq!(cage["current_appointment_id"], Value::Null);
    let reservations = cage["reservations"].as_array().unwrap();
    assert!(
        reservations
            .iter()
            .any(|r| &r["appointment_id"] == id && r["status"] == "checked_out")
    );
}

#[tokio::test]
#[ignore = "Requires running clinic server, database and an admin account"]
async fn test_cancelling_voids_the_pending_payment() {
    let admin = admin_session().await;
    let stay = booked_stay(&admin).await;
    let id = &stay.appointment["id"];

    let resp = set_status(&admin, id, "cancelled").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(transaction_for(&admin, id).await["status"], "cancelled");

    let check_in = stay.appointment["check_in_date"].as_str().unwrap().parse().unwrap();
    let check_out = stay.appointment["check_out_date"].as_str().unwrap().parse().unwrap();
    let free = available_cage_ids(&stay.client, check_in, check_out).await;
    assert!(free.contains(&stay.cage["id"]));
}

#[tokio::test]
#[ignore = "Requires running clinic server and its database"]
async fn test_reset_token_works_once() {
    let (session, me) = new_client_session().await;
    let email = me["email"].as_str().unwrap().to_string();
    let user = UserId::new(i32::try_from(me["id"].as_i64().unwrap()).unwrap());

    let pool = database_pool().await;
    let (token, digest) = password_reset::generate_token();
    PasswordResetRepository::new(&pool)
        .upsert(user, &digest, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let reset = |password: &'static str| {
        session
            .post(url("/api/auth/reset-password"))
            .json(&json!({ "token": token, "password": password }))
            .send()
    };
    assert_eq!(reset("a brand new password").await.unwrap().status(), StatusCode::OK);
    let resp = reset("yet another password").await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    login(&client(), &email, "a brand new password").await;
}
