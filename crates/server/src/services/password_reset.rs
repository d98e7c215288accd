//! Forgot-password flow.
//!
//! Tokens are 32 random bytes, base64url encoded for the link. Only their
//! SHA-256 digest reaches the database, so a leaked table cannot be replayed.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use vetclinic_core::{Email, TokenState};

use crate::db::{
    EmailOutboxRepository, PasswordResetRepository, UserRepository, password_resets, users,
};
use crate::error::AppError;
use crate::services::auth::{hash_password, validate_password};
use crate::services::email::render_password_reset;

/// Response to every reset request, whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a reset link has been sent.";

/// Generate a fresh token. Returns `(token, digest)`.
#[must_use]
pub fn generate_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let digest = hash_token(&token);
    (token, digest)
}

/// Hex SHA-256 of a token as stored.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// `None` is an unknown token.
fn token_error(state: Option<TokenState>) -> AppError {
    let message = match state {
        Some(TokenState::Used) => "Reset token has already been used",
        Some(TokenState::Expired) => "Reset token has expired",
        Some(TokenState::Valid) | None => "Invalid reset token",
    };
    AppError::BadRequest(message.to_string())
}

/// Issue a token and queue the reset email.
///
/// Unknown or malformed addresses get the same outcome as known ones.
///
/// # Errors
///
/// Returns `AppError::Database` if storing the token or queueing fails.
#[instrument(skip(pool, base_url, email))]
pub async fn request_reset(pool: &PgPool, base_url: &str, email: &str) -> Result<(), AppError> {
    let Ok(email) = Email::parse(email) else {
        return Ok(());
    };
    let Some(user) = UserRepository::new(pool).get_by_email(&email).await? else {
        info!(email = %email.masked(), "Password reset requested for unknown account");
        return Ok(());
    };

    let (token, digest) = generate_token();
    let now = Utc::now();
    PasswordResetRepository::new(pool)
        .upsert(user.id, &digest, TokenState::expiry_from(now))
        .await?;

    let reset_url = format!("{base_url}/reset-password?token={token}");
    match render_password_reset(&user.email, &user.name, &reset_url) {
        Ok(rendered) => {
            EmailOutboxRepository::new(pool).enqueue(&rendered).await?;
            info!(user_id = %user.id, "Password reset email queued");
        }
        Err(e) => warn!(user_id = %user.id, error = %e, "Failed to render password reset email"),
    }
    Ok(())
}

/// Check a token without consuming it.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown, used or expired token.
#[instrument(skip_all)]
pub async fn validate_token(pool: &PgPool, token: &str) -> Result<(), AppError> {
    let state = PasswordResetRepository::new(pool)
        .find(&hash_token(token))
        .await?
        .map(|stored| stored.state(Utc::now()));
    match state {
        Some(state) if state.is_valid() => Ok(()),
        other => Err(token_error(other)),
    }
}

/// Consume a token and set a new password.
///
/// The claim and the password write share a transaction; a concurrent
/// second redemption finds the token used.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a weak password or a token that is
/// unknown, used or expired.
#[instrument(skip_all)]
pub async fn reset_password(pool: &PgPool, token: &str, password: &str) -> Result<(), AppError> {
    validate_password(password)?;
    let digest = hash_token(token);

    let mut tx = pool.begin().await?;
    let Some(user) = password_resets::claim(&mut tx, &digest).await? else {
        drop(tx);
        let state = PasswordResetRepository::new(pool)
            .find(&digest)
            .await?
            .map(|stored| stored.state(Utc::now()));
        return Err(token_error(state));
    };

    let hash = hash_password(password)?;
    users::set_password_hash(&mut tx, user, &hash).await?;
    tx.commit().await?;

    info!(user_id = %user, "Password reset completed");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_url_safe_and_distinct() {
        let (a, digest_a) = generate_token();
        let (b, _) = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(digest_a, hash_token(&a));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_token_error_messages() {
        assert_eq!(
            token_error(Some(TokenState::Used)).to_string(),
            "Reset token has already been used"
        );
        assert_eq!(
            token_error(Some(TokenState::Expired)).to_string(),
            "Reset token has expired"
        );
        assert_eq!(token_error(None).to_string(), "Invalid reset token");
    }
}
