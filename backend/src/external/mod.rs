//! External API integrations

pub mod notifier;
pub mod payments;

pub use notifier::{Notification, NotificationClient, Notifier};
pub use payments::{PaymentProviderClient, ProviderSubscription};
