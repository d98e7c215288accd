//! Status and kind enums for clinic entities.
//!
//! All of these are stored as `TEXT` columns guarded by `CHECK` constraints,
//! so each enum carries its exact database label. Labels are also the JSON
//! representation, so `"pending payment"` keeps its space.

use serde::{Deserialize, Serialize};

/// Error returned when a label does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! define_status {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The database and wire label.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $label => Ok(Self::$variant), )+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, ::sqlx::error::BoxDynError> {
                let s = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(s.parse::<Self>()?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

define_status! {
    /// Account role. Staff (employees and admins) can see every client's data.
    #[derive(Default)]
    UserRole ("user role") {
        #[default]
        Client => "client",
        Employee => "employee",
        Admin => "admin",
    }
}

impl UserRole {
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Employee | Self::Admin)
    }
}

define_status! {
    /// Appointment lifecycle.
    AppointmentStatus ("appointment status") {
        Pending => "pending",
        PendingPayment => "pending payment",
        Paid => "paid",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        Rejected => "rejected",
    }
}

impl AppointmentStatus {
    /// Status after staff review a payment receipt.
    ///
    /// Receipt review only ever flips between `paid` and `pending payment`.
    #[must_use]
    pub const fn after_receipt_review(approved: bool) -> Self {
        if approved {
            Self::Paid
        } else {
            Self::PendingPayment
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Boarding documents may be reset for re-upload only after rejection.
    #[must_use]
    pub const fn can_reupload_documents(self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Whether new boarding documents can be attached directly.
    #[must_use]
    pub const fn accepts_documents(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::PendingPayment | Self::Paid | Self::Confirmed
        )
    }

    /// Whether a payment receipt can be uploaded. Only the payment stages
    /// take one; a rejected appointment must sort out its documents first.
    #[must_use]
    pub const fn accepts_receipt(self) -> bool {
        matches!(self, Self::Pending | Self::PendingPayment | Self::Paid)
    }

    /// Receipt review flips `pending payment` and `paid`; no other status
    /// is touched by it.
    #[must_use]
    pub const fn accepts_receipt_review(self) -> bool {
        matches!(self, Self::PendingPayment | Self::Paid)
    }

    /// Manual transitions staff may apply through the status endpoint.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use AppointmentStatus::{
            Cancelled, Completed, Confirmed, Paid, Pending, PendingPayment, Rejected,
        };
        matches!(
            (self, next),
            (Pending, PendingPayment | Confirmed | Cancelled | Rejected)
                | (PendingPayment, Paid | Cancelled | Rejected)
                | (Paid, PendingPayment | Confirmed | Cancelled)
                | (Confirmed, Completed | Cancelled)
                | (Rejected, Pending | Cancelled)
        )
    }
}

define_status! {
    /// Product order lifecycle. Independent of appointment status.
    OrderStatus ("order status") {
        Pending => "pending",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    /// Status after staff review the order's payment receipt.
    #[must_use]
    pub const fn after_receipt_review(approved: bool) -> Self {
        if approved {
            Self::Confirmed
        } else {
            Self::Pending
        }
    }
}

define_status! {
    /// Ledger status. Follows the parent's receipt review and is voided
    /// when an unpaid parent is cancelled.
    TransactionStatus ("transaction status") {
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

define_status! {
    /// Physical state of a boarding cage.
    CageStatus ("cage status") {
        Available => "available",
        Occupied => "occupied",
        Maintenance => "maintenance",
    }
}

define_status! {
    /// Cage size class.
    CageType ("cage type") {
        Small => "small",
        Medium => "medium",
        Large => "large",
        ExtraLarge => "extra_large",
    }
}

define_status! {
    /// Reservation lifecycle on a cage.
    ReservationStatus ("reservation status") {
        Reserved => "reserved",
        CheckedIn => "checked_in",
        CheckedOut => "checked_out",
        Cancelled => "cancelled",
    }
}

impl ReservationStatus {
    /// Active reservations claim their cage for the stay's dates.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Reserved | Self::CheckedIn)
    }
}

define_status! {
    /// The two documents a boarding client must provide.
    BoardingDocument ("boarding document") {
        Id => "id",
        Signature => "signature",
    }
}

impl BoardingDocument {
    /// Multipart field name used when uploading this document.
    #[must_use]
    pub const fn form_field(self) -> &'static str {
        match self {
            Self::Id => "boarding_id",
            Self::Signature => "boarding_signature",
        }
    }

    /// Human-readable name for notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "ID document",
            Self::Signature => "signature",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), *status);
        }
        for kind in CageType::ALL {
            assert_eq!(kind.to_string().parse::<CageType>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_pending_payment_label_has_space() {
        assert_eq!(AppointmentStatus::PendingPayment.as_str(), "pending payment");
        let json = serde_json::to_string(&AppointmentStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending payment\"");
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let err = "huge".parse::<CageType>().unwrap_err();
        assert_eq!(err.kind, "cage type");
        assert_eq!(err.to_string(), "invalid cage type: huge");
    }

    #[test]
    fn test_receipt_review_outcomes() {
        assert_eq!(
            AppointmentStatus::after_receipt_review(true),
            AppointmentStatus::Paid
        );
        assert_eq!(
            AppointmentStatus::after_receipt_review(false),
            AppointmentStatus::PendingPayment
        );
        assert_eq!(OrderStatus::after_receipt_review(true), OrderStatus::Confirmed);
        assert_eq!(OrderStatus::after_receipt_review(false), OrderStatus::Pending);
    }

    #[test]
    fn test_receipt_review_only_in_payment_stages() {
        use AppointmentStatus::{
            Cancelled, Completed, Confirmed, Paid, Pending, PendingPayment, Rejected,
        };
        assert!(PendingPayment.accepts_receipt_review());
        assert!(Paid.accepts_receipt_review());
        for status in [Pending, Confirmed, Completed, Cancelled, Rejected] {
            assert!(!status.accepts_receipt_review(), "{status}");
        }
        assert!(Pending.accepts_receipt());
        assert!(!Rejected.accepts_receipt());
        assert!(!Confirmed.accepts_receipt());
    }

    #[test]
    fn test_only_rejected_can_reupload() {
        for status in AppointmentStatus::ALL {
            assert_eq!(
                status.can_reupload_documents(),
                *status == AppointmentStatus::Rejected
            );
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_transitions() {
        for from in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            for to in AppointmentStatus::ALL {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_active_reservations() {
        assert!(ReservationStatus::Reserved.is_active());
        assert!(ReservationStatus::CheckedIn.is_active());
        assert!(!ReservationStatus::CheckedOut.is_active());
        assert!(!ReservationStatus::Cancelled.is_active());
    }

    #[test]
    fn test_staff_roles() {
        assert!(!UserRole::Client.is_staff());
        assert!(UserRole::Employee.is_staff());
        assert!(UserRole::Admin.is_staff());
    }
}
