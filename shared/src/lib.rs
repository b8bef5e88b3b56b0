//! Shared types and models for the Dance Studio Management Platform
//!
//! This crate holds the domain vocabulary and the pure business rules
//! (tenancy parsing, enrollment capacity, invoice balances, billing
//! intervals, message targeting) used by the backend and its tests.

pub mod error;
pub mod models;
pub mod tenancy;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
