//! Core types for the clinic.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod rate;
pub mod reset_token;
pub mod status;
pub mod stay;

pub use email::{Email, EmailError};
pub use id::*;
pub use rate::{DailyRate, RateError, non_negative};
pub use reset_token::{RESET_TOKEN_TTL_MINUTES, TokenState};
pub use status::*;
pub use stay::{StayError, StayRange};
