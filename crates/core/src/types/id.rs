//! Newtype IDs for type-safe entity references.
//!
//! Every table uses a `SERIAL` primary key. Wrapping the raw `i32` keeps a
//! `PetId` from being passed where a `CageId` is expected.

/// Macro to define a type-safe ID wrapper around `i32`.
///
/// Generates serde (transparent), `Display`, `FromStr`, `From` conversions and,
/// with the `postgres` feature, `sqlx` `Type`/`Encode`/`Decode`.
///
/// # Example
///
/// ```rust
/// # use vetclinic_core::define_id;
/// define_id!(KennelId);
/// define_id!(VisitId);
///
/// let kennel = KennelId::new(7);
/// assert_eq!(kennel.as_i32(), 7);
/// assert_eq!("7".parse::<KennelId>().ok(), Some(kennel));
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database ID.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(UserId);
define_id!(PetId);
define_id!(ServiceId);
define_id!(CategoryId);
define_id!(ProductId);
define_id!(CageId);
define_id!(ReservationId);
define_id!(AppointmentId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(TransactionId);
define_id!(NotificationId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_parse_from_path_segments() {
        assert_eq!("42".parse::<CageId>().unwrap(), CageId::new(42));
        assert_eq!(" 3 ".parse::<PetId>().unwrap().as_i32(), 3);
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&AppointmentId::new(9)).unwrap();
        assert_eq!(json, "9");
        let id: OrderId = serde_json::from_str("12").unwrap();
        assert_eq!(i32::from(id), 12);
    }
}
