//! Boarding rates and price arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stay::StayRange;

/// Errors validating a monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("daily rate must be greater than zero")]
    NotPositive,
    #[error("amount cannot be negative")]
    Negative,
    #[error("at most two decimal places are allowed")]
    TooPrecise,
    #[error("amount must not exceed {max}", max = max_amount())]
    TooLarge,
}

/// Largest value a `NUMERIC(10, 2)` column holds.
#[must_use]
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Amounts are stored with two decimal places; anything finer would be
/// rounded by the database, possibly to zero.
fn storable(amount: Decimal) -> Result<Decimal, RateError> {
    if amount.normalize().scale() > 2 {
        return Err(RateError::TooPrecise);
    }
    if amount.abs() > max_amount() {
        return Err(RateError::TooLarge);
    }
    Ok(amount)
}

/// A strictly positive per-night cage price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DailyRate(Decimal);

impl DailyRate {
    /// # Errors
    ///
    /// Returns [`RateError::NotPositive`] for zero or negative amounts,
    /// [`RateError::TooPrecise`] below a cent and [`RateError::TooLarge`]
    /// past [`max_amount`].
    pub fn new(amount: Decimal) -> Result<Self, RateError> {
        if amount <= Decimal::ZERO {
            return Err(RateError::NotPositive);
        }
        storable(amount).map(Self)
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of boarding for the whole stay.
    #[must_use]
    pub fn cost_for(&self, stay: &StayRange) -> Decimal {
        self.0 * Decimal::from(stay.nights())
    }
}

impl TryFrom<Decimal> for DailyRate {
    type Error = RateError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DailyRate> for Decimal {
    fn from(rate: DailyRate) -> Self {
        rate.0
    }
}

/// Validate a non-negative price (services, products).
///
/// # Errors
///
/// Returns [`RateError::Negative`] when the amount is below zero, and the
/// same precision and range errors as [`DailyRate::new`].
pub fn non_negative(amount: Decimal) -> Result<Decimal, RateError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(RateError::Negative);
    }
    storable(amount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_rate_must_be_positive() {
        assert_eq!(DailyRate::new(Decimal::ZERO), Err(RateError::NotPositive));
        assert_eq!(DailyRate::new(Decimal::new(-500, 2)), Err(RateError::NotPositive));
        assert!(DailyRate::new(Decimal::new(2550, 2)).is_ok());
    }

    #[test]
    fn test_cost_for_stay() {
        let rate = DailyRate::new(Decimal::new(2500, 2)).unwrap();
        let stay = StayRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
        )
        .unwrap();
        assert_eq!(rate.cost_for(&stay), Decimal::new(7500, 2));
    }

    #[test]
    fn test_deserialize_rejects_zero_rate() {
        assert!(serde_json::from_str::<DailyRate>("\"0\"").is_err());
        let rate: DailyRate = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(rate.amount(), Decimal::new(1999, 2));
    }

    #[test]
    fn test_non_negative() {
        assert!(non_negative(Decimal::ZERO).is_ok());
        assert!(non_negative(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_sub_cent_rate_rejected() {
        assert_eq!(DailyRate::new(Decimal::new(1, 3)), Err(RateError::TooPrecise));
        assert_eq!(non_negative(Decimal::new(1999, 3)), Err(RateError::TooPrecise));
        // Trailing zeros are not extra precision.
        let rate = DailyRate::new(Decimal::new(19_990, 3)).unwrap();
        assert_eq!(rate.amount(), Decimal::new(1999, 2));
    }

    #[test]
    fn test_amount_must_fit_column() {
        assert!(DailyRate::new(max_amount()).is_ok());
        assert_eq!(
            DailyRate::new(Decimal::new(10_000_000_000, 2)),
            Err(RateError::TooLarge)
        );
        assert_eq!(
            non_negative(Decimal::new(100_000_000, 0)),
            Err(RateError::TooLarge)
        );
    }

    #[test]
    fn test_deserialize_rejects_sub_cent_rate() {
        assert!(serde_json::from_str::<DailyRate>("\"0.001\"").is_err());
    }
}
