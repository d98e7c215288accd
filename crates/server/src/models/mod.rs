//! Domain models for the clinic API.
//!
//! Row types derive `sqlx::FromRow` and `Serialize` so repositories can
//! return them straight to handlers. Users go through an internal row type
//! in [`crate::db::users`] because the password hash never leaves the
//! repository.

pub mod appointment;
pub mod cage;
pub mod catalog;
pub mod notification;
pub mod order;
pub mod pet;
pub mod session;
pub mod user;

pub use appointment::{Appointment, AppointmentDetail};
pub use cage::{Cage, CageListing, CageReservation};
pub use catalog::{Category, ClinicService, Product};
pub use notification::Notification;
pub use order::{Order, OrderItem, Transaction};
pub use pet::Pet;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
