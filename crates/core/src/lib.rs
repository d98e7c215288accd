//! Vet Clinic Core - Shared domain types.
//!
//! This crate provides the types used across the clinic components:
//! - `server` - JSON API for clients, employees and admins
//! - `cli` - Command-line tools for migrations and staff accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Database encoding is available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, statuses, stay ranges, rates and reset tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
