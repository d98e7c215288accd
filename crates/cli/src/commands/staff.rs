//! Staff account management.
//!
//! Public registration only creates clients, so the first admin has to be
//! created here.
//!
//! # Usage
//!
//! ```bash
//! VC_STAFF_PASSWORD='...' vc-cli staff create -e vet@clinic.test -n "Dr. Reyes" -r employee
//! ```

use vetclinic_core::{UserId, UserRole};
use vetclinic_server::db;
use vetclinic_server::services::{AuthError, AuthService, Registration};

use super::{CommandError, database_url};

/// Parse a staff role. Clients register themselves through the API.
fn staff_role(role: &str) -> Result<UserRole, CommandError> {
    let parsed = role
        .parse::<UserRole>()
        .map_err(|e| CommandError::Invalid(e.to_string()))?;
    if !parsed.is_staff() {
        return Err(CommandError::Invalid(format!(
            "Role must be employee or admin, got {role}"
        )));
    }
    Ok(parsed)
}

/// Create an employee or admin account.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<UserId, CommandError> {
    let role = staff_role(role)?;
    let database_url = database_url()?;

    tracing::info!("Connecting to clinic database...");
    let pool = db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register(&Registration {
            email,
            password,
            name,
            phone: None,
            address: None,
            role,
        })
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => {
                CommandError::Invalid(format!("An account already exists for {email}"))
            }
            other => CommandError::Invalid(other.to_string()),
        })?;

    tracing::info!(user_id = %user.id, role = %user.role, "Staff account created");
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_staff_roles_accepted() {
        assert!(matches!(staff_role("admin"), Ok(UserRole::Admin)));
        assert!(matches!(staff_role("employee"), Ok(UserRole::Employee)));
        assert!(staff_role("client").is_err());
        assert!(staff_role("owner").is_err());
    }
}
