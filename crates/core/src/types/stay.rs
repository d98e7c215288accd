//! Boarding stay date ranges.
//!
//! Stays are closed intervals of calendar days. Two stays conflict when they
//! share at least one day, so a pet checking out on the 15th and another
//! checking in on the 15th cannot share a cage. The SQL availability filter
//! uses the same comparison (`a.check_in <= b.check_out AND b.check_in <=
//! a.check_out`); [`StayRange::overlaps`] is the in-process mirror of it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors building a [`StayRange`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StayError {
    #[error("check-out date {check_out} is before check-in date {check_in}")]
    Inverted {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    #[error("both check_in and check_out are required")]
    Incomplete,
}

/// An inclusive `[check_in, check_out]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    /// Build a range, rejecting a check-out before the check-in.
    ///
    /// Same-day stays are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`StayError::Inverted`] when `check_out < check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, StayError> {
        if check_out < check_in {
            return Err(StayError::Inverted {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Build a range from optional query parameters.
    ///
    /// `(None, None)` means "no date filter" and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StayError::Incomplete`] when only one date is present, or
    /// [`StayError::Inverted`] when the dates are out of order.
    pub fn from_optional(
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<Option<Self>, StayError> {
        match (check_in, check_out) {
            (None, None) => Ok(None),
            (Some(ci), Some(co)) => Self::new(ci, co).map(Some),
            _ => Err(StayError::Incomplete),
        }
    }

    #[must_use]
    pub const fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    #[must_use]
    pub const fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Inclusive interval intersection.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.check_in <= other.check_out && other.check_in <= self.check_out
    }

    /// Billable nights. A same-day stay is billed as one night.
    #[must_use]
    pub fn nights(&self) -> u32 {
        let days = (self.check_out - self.check_in).num_days();
        u32::try_from(days).unwrap_or(0).max(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stay(a: &str, b: &str) -> StayRange {
        StayRange::new(day(a), day(b)).unwrap()
    }

    #[test]
    fn test_overlap_is_inclusive_at_boundaries() {
        let booked = stay("2025-03-10", "2025-03-15");
        assert!(booked.overlaps(&stay("2025-03-12", "2025-03-20")));
        assert!(booked.overlaps(&stay("2025-03-15", "2025-03-20")));
        assert!(booked.overlaps(&stay("2025-03-01", "2025-03-10")));
        assert!(!booked.overlaps(&stay("2025-03-16", "2025-03-20")));
        assert!(!booked.overlaps(&stay("2025-03-01", "2025-03-09")));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = stay("2025-05-01", "2025-05-04");
        let b = stay("2025-05-04", "2025-05-09");
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            StayRange::new(day("2025-03-10"), day("2025-03-09")),
            Err(StayError::Inverted { .. })
        ));
    }

    #[test]
    fn test_from_optional() {
        assert_eq!(StayRange::from_optional(None, None).unwrap(), None);
        assert_eq!(
            StayRange::from_optional(Some(day("2025-01-01")), None),
            Err(StayError::Incomplete)
        );
        assert!(
            StayRange::from_optional(Some(day("2025-01-01")), Some(day("2025-01-02")))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_nights() {
        assert_eq!(stay("2025-03-10", "2025-03-15").nights(), 5);
        assert_eq!(stay("2025-03-10", "2025-03-10").nights(), 1);
    }
}
