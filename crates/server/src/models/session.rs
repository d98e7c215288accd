//! Session-stored identity.

use serde::{Deserialize, Serialize};

use vetclinic_core::{Email, UserId, UserRole};

/// Minimal identity stored in the session at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Whether the caller may act on a record owned by `owner`.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_staff() || self.id == owner
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("someone@clinic.test").unwrap(),
            name: "Someone".to_string(),
            role,
        }
    }

    #[test]
    fn test_clients_only_access_their_own_records() {
        let client = user(4, UserRole::Client);
        assert!(client.can_access(UserId::new(4)));
        assert!(!client.can_access(UserId::new(5)));
    }

    #[test]
    fn test_staff_access_everything() {
        assert!(user(1, UserRole::Employee).can_access(UserId::new(99)));
        assert!(user(1, UserRole::Admin).can_access(UserId::new(99)));
    }
}
