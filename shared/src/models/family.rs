//! Family and student models

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The billing and guardianship unit for one or more students
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub address: Option<String>,
    /// Free-form labels used for message targeting (e.g. "competition-team")
    pub tags: Vec<String>,
    /// Customer id at the payment provider
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A dancer belonging to a family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub family_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalize family tags: trimmed, lowercase, spaces to hyphens, unique, sorted
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| {
            t.trim()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
        })
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Age in whole years on a given date
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    if on < date_of_birth {
        return None;
    }
    let mut years = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Competition Team ".to_string(),
            "competition-team".to_string(),
            "".to_string(),
            "Recital 2025".to_string(),
        ];
        assert_eq!(
            normalize_tags(&tags),
            vec!["competition-team".to_string(), "recital-2025".to_string()]
        );
    }

    #[test]
    fn test_age_on() {
        let dob = NaiveDate::from_ymd_opt(2016, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), Some(7));
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), Some(8));
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()), None);
    }
}
