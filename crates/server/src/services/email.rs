//! Email rendering and SMTP delivery.
//!
//! Workflows render an email into a [`RenderedEmail`] and queue it in the
//! outbox; [`EmailService`] is only used by the outbox dispatcher.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use vetclinic_core::{Email, RESET_TOKEN_TTL_MINUTES};

use crate::config::EmailConfig;
use crate::db::email_outbox::RenderedEmail;

/// HTML template for a workflow notification.
#[derive(Template)]
#[template(path = "email/notification.html")]
struct NotificationEmailHtml<'a> {
    name: &'a str,
    title: &'a str,
    message: &'a str,
    link: &'a str,
}

/// Plain text template for a workflow notification.
#[derive(Template)]
#[template(path = "email/notification.txt")]
struct NotificationEmailText<'a> {
    name: &'a str,
    title: &'a str,
    message: &'a str,
    link: &'a str,
}

/// HTML template for the password reset link.
#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
    ttl_minutes: i64,
}

/// Plain text template for the password reset link.
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    name: &'a str,
    reset_url: &'a str,
    ttl_minutes: i64,
}

/// Errors that can occur when rendering or sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Render a notification email pointing the recipient at the clinic site.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn render_notification(
    to: &Email,
    name: &str,
    title: &str,
    message: &str,
    base_url: &str,
) -> Result<RenderedEmail, EmailError> {
    let html = NotificationEmailHtml {
        name,
        title,
        message,
        link: base_url,
    }
    .render()?;
    let text = NotificationEmailText {
        name,
        title,
        message,
        link: base_url,
    }
    .render()?;

    Ok(RenderedEmail {
        recipient: to.as_str().to_owned(),
        subject: title.to_owned(),
        text_body: text,
        html_body: html,
    })
}

/// Render the password reset email.
///
/// # Errors
///
/// Returns `EmailError::Template` if rendering fails.
pub fn render_password_reset(
    to: &Email,
    name: &str,
    reset_url: &str,
) -> Result<RenderedEmail, EmailError> {
    let html = PasswordResetEmailHtml {
        name,
        reset_url,
        ttl_minutes: RESET_TOKEN_TTL_MINUTES,
    }
    .render()?;
    let text = PasswordResetEmailText {
        name,
        reset_url,
        ttl_minutes: RESET_TOKEN_TTL_MINUTES,
    }
    .render()?;

    Ok(RenderedEmail {
        recipient: to.as_str().to_owned(),
        subject: "Reset your password".to_owned(),
        text_body: text,
        html_body: html,
    })
}

/// Email service for delivering queued emails over SMTP.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    ///
    /// # Errors
    ///
    /// Returns error if an address is invalid or delivery fails.
    pub async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_escapes_html_but_not_text() {
        let to = Email::parse("owner@example.com").unwrap();
        let email = render_notification(
            &to,
            "Sam",
            "Receipt rejected",
            "Amount <b>mismatch</b>",
            "https://clinic.test",
        )
        .unwrap();

        assert_eq!(email.recipient, "owner@example.com");
        assert_eq!(email.subject, "Receipt rejected");
        assert!(email.text_body.contains("Amount <b>mismatch</b>"));
        assert!(!email.html_body.contains("<b>mismatch"));
        assert!(email.html_body.contains("clinic.test"));
    }

    #[test]
    fn test_password_reset_carries_link_and_ttl() {
        let to = Email::parse("owner@example.com").unwrap();
        let url = "https://clinic.test/reset-password?token=abc";
        let email = render_password_reset(&to, "Sam", url).unwrap();

        assert!(email.text_body.contains(url));
        assert!(email.text_body.contains("60 minutes"));
        assert!(email.html_body.contains("Choose a new password"));
    }
}
