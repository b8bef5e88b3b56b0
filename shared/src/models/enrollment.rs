//! Enrollment models and lifecycle rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;

/// Relationship between a student and a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<i32>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enrollment status lifecycle
///
/// ```text
/// pending ──► active ──► dropped
///    │          ▲
///    ├──► waitlisted
///    │          │
///    └──────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Waitlisted,
    Dropped,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Waitlisted => "waitlisted",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EnrollmentStatus::Pending),
            "active" => Some(EnrollmentStatus::Active),
            "waitlisted" => Some(EnrollmentStatus::Waitlisted),
            "dropped" => Some(EnrollmentStatus::Dropped),
            "cancelled" => Some(EnrollmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Dropped and cancelled enrollments are closed; re-enrolling reopens the row
    pub fn is_closed(&self) -> bool {
        matches!(self, EnrollmentStatus::Dropped | EnrollmentStatus::Cancelled)
    }

    /// Check whether a status transition is allowed
    pub fn can_transition(&self, to: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Pending, Waitlisted)
                | (Pending, Cancelled)
                | (Waitlisted, Active)
                | (Waitlisted, Cancelled)
                | (Active, Dropped)
        )
    }

    /// Validate a transition, returning a rule error when not allowed
    pub fn transition(&self, to: EnrollmentStatus) -> Result<EnrollmentStatus, RuleError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(RuleError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a class has room for one more active student
pub fn has_capacity(capacity: Option<i32>, active_count: i64) -> bool {
    match capacity {
        None => true,
        Some(cap) => active_count < cap as i64,
    }
}

/// Status for a new (or reopened) enrollment.
///
/// Parent requests wait for approval; staff enrollments go straight in
/// when the class has room and onto the waitlist otherwise.
pub fn initial_status(
    capacity: Option<i32>,
    active_count: i64,
    requested_by_parent: bool,
) -> EnrollmentStatus {
    if requested_by_parent {
        EnrollmentStatus::Pending
    } else if has_capacity(capacity, active_count) {
        EnrollmentStatus::Active
    } else {
        EnrollmentStatus::Waitlisted
    }
}

/// Check that an enrollment can be promoted into `active`.
///
/// Used both for approving pending requests and promoting from the
/// waitlist; a full class refuses the promotion.
pub fn check_activation(
    current: EnrollmentStatus,
    capacity: Option<i32>,
    active_count: i64,
) -> Result<(), RuleError> {
    current.transition(EnrollmentStatus::Active)?;
    if !has_capacity(capacity, active_count) {
        return Err(RuleError::ClassFull {
            capacity: capacity.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Status a pending request lands in when approved.
///
/// Approving into a full class parks the request on the waitlist instead
/// of failing, so the family keeps its place.
pub fn approval_status(capacity: Option<i32>, active_count: i64) -> EnrollmentStatus {
    if has_capacity(capacity, active_count) {
        EnrollmentStatus::Active
    } else {
        EnrollmentStatus::Waitlisted
    }
}

/// Next waitlist position given the current maximum
pub fn next_waitlist_position(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "active", "waitlisted", "dropped", "cancelled"] {
            assert_eq!(EnrollmentStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(EnrollmentStatus::parse("enrolled").is_none());
    }

    #[test]
    fn test_allowed_transitions() {
        use EnrollmentStatus::*;
        assert!(Pending.can_transition(Active));
        assert!(Pending.can_transition(Waitlisted));
        assert!(Waitlisted.can_transition(Active));
        assert!(Active.can_transition(Dropped));
        assert!(!Active.can_transition(Waitlisted));
        assert!(!Dropped.can_transition(Active));
        assert!(!Cancelled.can_transition(Pending));
        assert!(!Active.can_transition(Active));
    }

    #[test]
    fn test_unlimited_capacity() {
        assert!(has_capacity(None, 10_000));
    }

    #[test]
    fn test_capacity_boundary() {
        assert!(has_capacity(Some(12), 11));
        assert!(!has_capacity(Some(12), 12));
        assert!(!has_capacity(Some(12), 13));
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(Some(10), 3, true), EnrollmentStatus::Pending);
        assert_eq!(initial_status(Some(10), 3, false), EnrollmentStatus::Active);
        assert_eq!(initial_status(Some(10), 10, false), EnrollmentStatus::Waitlisted);
        assert_eq!(initial_status(None, 99, false), EnrollmentStatus::Active);
    }

    #[test]
    fn test_cannot_promote_into_full_class() {
        let err = check_activation(EnrollmentStatus::Waitlisted, Some(8), 8).unwrap_err();
        assert_eq!(err, RuleError::ClassFull { capacity: 8 });
        assert!(check_activation(EnrollmentStatus::Waitlisted, Some(8), 7).is_ok());
    }

    #[test]
    fn test_cannot_promote_from_closed_status() {
        assert!(matches!(
            check_activation(EnrollmentStatus::Dropped, None, 0),
            Err(RuleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_approval_status_falls_back_to_waitlist() {
        assert_eq!(approval_status(Some(2), 1), EnrollmentStatus::Active);
        assert_eq!(approval_status(Some(2), 2), EnrollmentStatus::Waitlisted);
    }

    #[test]
    fn test_next_waitlist_position() {
        assert_eq!(next_waitlist_position(None), 1);
        assert_eq!(next_waitlist_position(Some(4)), 5);
    }
}
