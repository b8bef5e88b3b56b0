//! Business logic services for the dance studio platform

pub mod announcement;
pub mod attendance;
pub mod auth;
pub mod billing_webhook;
pub mod class;
pub mod enrollment;
pub mod family;
pub mod invoice;
pub mod media;
pub mod messaging;
pub mod reporting;
pub mod staff;
pub mod studio;
pub mod tuition;
pub mod waiver;

pub use announcement::AnnouncementService;
pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use billing_webhook::BillingWebhookService;
pub use class::ClassService;
pub use enrollment::EnrollmentService;
pub use family::FamilyService;
pub use invoice::InvoiceService;
pub use media::MediaService;
pub use messaging::MessagingService;
pub use reporting::ReportingService;
pub use staff::StaffService;
pub use studio::StudioService;
pub use tuition::TuitionService;
pub use waiver::WaiverService;
