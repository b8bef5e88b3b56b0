//! HTTP handlers, grouped by surface
//!
//! Admin back-office handlers check permissions per resource; the
//! instructor and parent portals scope every call to the caller's own
//! classes or family.

pub mod attendance;
pub mod auth;
pub mod billing;
pub mod classes;
pub mod content;
pub mod enrollments;
pub mod families;
pub mod health;
pub mod instructor;
pub mod messages;
pub mod parent;
pub mod public;
pub mod reporting;
pub mod staff;
pub mod studio;
pub mod webhooks;

pub use auth::{login, logout, me, refresh, register};
pub use health::health_check;
