//! Dance class models

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recurring weekly class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DanceClass {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Skill level, e.g. "beginner", "intermediate", "advanced"
    pub level: Option<String>,
    /// Dance style, e.g. "ballet", "jazz", "hip-hop"
    pub style: Option<String>,
    pub instructor_id: Option<Uuid>,
    /// ISO weekday number, Monday = 1
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    /// Maximum active enrollments; None = unlimited
    pub capacity: Option<i32>,
    pub monthly_tuition: Decimal,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert an ISO weekday number (Monday = 1) to a chrono weekday
pub fn weekday_from_iso(day: i16) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Normalize a level label for comparison and targeting
pub fn normalize_level(level: &str) -> String {
    level.trim().to_lowercase()
}

/// Whether a class meets on `date`, given its weekday and active window
pub fn meets_on(
    day_of_week: i16,
    starts_on: Option<NaiveDate>,
    ends_on: Option<NaiveDate>,
    date: NaiveDate,
) -> bool {
    use chrono::Datelike;

    let Some(weekday) = weekday_from_iso(day_of_week) else {
        return false;
    };
    if date.weekday() != weekday {
        return false;
    }
    if starts_on.is_some_and(|s| date < s) {
        return false;
    }
    if ends_on.is_some_and(|e| date > e) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_from_iso() {
        assert_eq!(weekday_from_iso(1), Some(Weekday::Mon));
        assert_eq!(weekday_from_iso(7), Some(Weekday::Sun));
        assert_eq!(weekday_from_iso(0), None);
        assert_eq!(weekday_from_iso(8), None);
    }

    #[test]
    fn test_meets_on() {
        // 2024-09-02 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        assert!(meets_on(1, None, None, monday));
        assert!(!meets_on(1, None, None, tuesday));
        assert!(!meets_on(1, Some(tuesday), None, monday));
        assert!(!meets_on(1, None, Some(NaiveDate::from_ymd_opt(2024, 8, 31).unwrap()), monday));
    }

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("  Intermediate "), "intermediate");
    }
}
