//! Cross-type domain rules: booking price, availability and the payment
//! lifecycle as the server composes them.

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use rust_decimal::Decimal;

use vetclinic_core::{
    AppointmentStatus, DailyRate, Email, OrderStatus, ReservationStatus, StayRange,
};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn boarding_total_is_service_price_plus_nightly_rate() {
    let service_price = Decimal::new(1500, 2);
    let rate = DailyRate::new(Decimal::new(3000, 2)).unwrap();
    let stay = StayRange::new(day("2025-07-01"), day("2025-07-04")).unwrap();

    assert_eq!(service_price + rate.cost_for(&stay), Decimal::new(10500, 2));
}

#[test]
fn cage_is_free_again_the_day_after_checkout() {
    let booked = StayRange::new(day("2025-07-01"), day("2025-07-04")).unwrap();
    let same_day_handover = StayRange::new(day("2025-07-04"), day("2025-07-06")).unwrap();
    let next_day = StayRange::new(day("2025-07-05"), day("2025-07-06")).unwrap();

    assert!(booked.overlaps(&same_day_handover));
    assert!(!booked.overlaps(&next_day));
}

#[test]
fn only_active_reservations_block_a_cage() {
    assert!(ReservationStatus::Reserved.is_active());
    assert!(ReservationStatus::CheckedIn.is_active());
    assert!(!ReservationStatus::CheckedOut.is_active());
    assert!(!ReservationStatus::Cancelled.is_active());
}

#[test]
fn rejected_receipt_can_be_resubmitted_and_approved() {
    assert!(AppointmentStatus::Pending.can_transition_to(AppointmentStatus::PendingPayment));

    let after_rejection = AppointmentStatus::after_receipt_review(false);
    assert_eq!(after_rejection, AppointmentStatus::PendingPayment);

    let after_approval = AppointmentStatus::after_receipt_review(true);
    assert_eq!(after_approval, AppointmentStatus::Paid);
    assert!(after_approval.can_transition_to(AppointmentStatus::Confirmed));
}

#[test]
fn closed_appointments_accept_nothing() {
    for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
        assert!(status.is_terminal());
        assert!(!status.accepts_documents());
        assert!(
            AppointmentStatus::ALL
                .iter()
                .all(|next| !status.can_transition_to(*next))
        );
    }
}

#[test]
fn document_rejection_requires_reupload_before_new_documents() {
    let rejected = AppointmentStatus::Rejected;
    assert!(rejected.can_reupload_documents());
    assert!(!rejected.accepts_documents());
    assert!(rejected.can_transition_to(AppointmentStatus::Pending));
    assert!(AppointmentStatus::Pending.accepts_documents());
}

#[test]
fn order_receipt_review_flips_between_pending_and_confirmed() {
    assert_eq!(OrderStatus::after_receipt_review(true), OrderStatus::Confirmed);
    assert_eq!(OrderStatus::after_receipt_review(false), OrderStatus::Pending);
}

#[test]
fn emails_are_normalized_for_lookup() {
    let typed = Email::parse("  Owner@Clinic.Test ").unwrap();
    let stored = Email::parse("owner@clinic.test").unwrap();
    assert_eq!(typed, stored);
}

#[test]
fn statuses_serialize_as_their_labels() {
    let json = serde_json::to_value(AppointmentStatus::PendingPayment).unwrap();
    assert_eq!(json, "pending payment");
    let parsed: OrderStatus = serde_json::from_value(serde_json::json!("cancelled")).unwrap();
    assert_eq!(parsed, OrderStatus::Cancelled);
}
