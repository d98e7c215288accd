//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password registration and login (Argon2id)
//! - `boarding` - Appointment booking, status changes, check-in/out and boarding documents
//! - `email` - Email templates and SMTP delivery
//! - `notify` - In-app notifications with optional queued email
//! - `orders` - Shop checkout and cancellation
//! - `outbox` - Background delivery of queued email
//! - `password_reset` - Forgot-password tokens
//! - `uploads` - Multipart file validation and local storage
//! - `verification` - Payment receipt upload and review

pub mod auth;
pub mod boarding;
pub mod email;
pub mod notify;
pub mod orders;
pub mod outbox;
pub mod password_reset;
pub mod uploads;
pub mod verification;

pub use auth::{AuthError, AuthService, Registration};
pub use email::{EmailError, EmailService};
pub use notify::{Delivery, Notice};
pub use uploads::{UploadError, UploadKind, UploadStore};
