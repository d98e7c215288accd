//! Password-reset token state.
//!
//! A token moves `issued -> consumed` or `issued -> expired`. Only the state
//! rules live here; issuing and storing tokens is the server's job.

use chrono::{DateTime, Utc};

/// Lifetime of a reset token from the moment it is issued.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Observable state of a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid,
    Used,
    Expired,
}

impl TokenState {
    /// A token is valid iff it is unused and `now < expires_at`.
    ///
    /// A used token reports `Used` even after it expires, so a second
    /// redemption is always explained as "already used".
    #[must_use]
    pub fn evaluate(used: bool, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if used {
            Self::Used
        } else if now < expires_at {
            Self::Valid
        } else {
            Self::Expired
        }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Expiry for a token issued at `issued_at`.
    #[must_use]
    pub fn expiry_from(issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + chrono::Duration::minutes(RESET_TOKEN_TTL_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_valid_before_expiry() {
        let now = Utc::now();
        assert_eq!(
            TokenState::evaluate(false, now + Duration::minutes(5), now),
            TokenState::Valid
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        assert_eq!(TokenState::evaluate(false, now, now), TokenState::Expired);
    }

    #[test]
    fn test_used_wins_over_expired() {
        let now = Utc::now();
        assert_eq!(
            TokenState::evaluate(true, now - Duration::hours(2), now),
            TokenState::Used
        );
        assert_eq!(
            TokenState::evaluate(true, now + Duration::hours(2), now),
            TokenState::Used
        );
    }

    #[test]
    fn test_ttl_is_one_hour() {
        let issued = Utc::now();
        assert_eq!(TokenState::expiry_from(issued) - issued, Duration::hours(1));
    }
}
