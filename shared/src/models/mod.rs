//! Domain models for the Dance Studio Management Platform

mod announcement;
mod attendance;
mod billing;
mod class;
mod enrollment;
mod family;
mod media;
mod messaging;
mod studio;
mod user;
mod waiver;

pub use announcement::*;
pub use attendance::*;
pub use billing::*;
pub use class::*;
pub use enrollment::*;
pub use family::*;
pub use media::*;
pub use messaging::*;
pub use studio::*;
pub use user::*;
pub use waiver::*;
