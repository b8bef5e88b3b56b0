//! Studio (tenant) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dance studio registered on the platform. Each studio is one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Studio {
    pub id: Uuid,
    /// Subdomain label, e.g. "tutu-town" for tutu-town.studiohub.app
    pub slug: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// IANA timezone name used for class schedules
    pub timezone: String,
    /// ISO 4217 currency code for invoices
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a studio, safe to serve on the tenant's landing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioProfile {
    pub slug: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub timezone: String,
}

impl From<Studio> for StudioProfile {
    fn from(studio: Studio) -> Self {
        Self {
            slug: studio.slug,
            name: studio.name,
            email: studio.email,
            phone: studio.phone,
            address: studio.address,
            timezone: studio.timezone,
        }
    }
}
