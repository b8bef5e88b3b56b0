//! Enrollment rule tests
//!
//! Covers the status lifecycle, class capacity and waitlist ordering.

use proptest::prelude::*;
use shared::models::{
    approval_status, check_activation, has_capacity, initial_status, next_waitlist_position,
    EnrollmentStatus,
};
use shared::RuleError;

fn status_strategy() -> impl Strategy<Value = EnrollmentStatus> {
    prop_oneof![
        Just(EnrollmentStatus::Pending),
        Just(EnrollmentStatus::Active),
        Just(EnrollmentStatus::Waitlisted),
        Just(EnrollmentStatus::Dropped),
        Just(EnrollmentStatus::Cancelled),
    ]
}

proptest! {
    /// A full class never accepts another active student
    #[test]
    fn prop_activation_refused_when_full(
        capacity in 1i32..60,
        extra in 0i64..10,
        from in prop_oneof![Just(EnrollmentStatus::Pending), Just(EnrollmentStatus::Waitlisted)],
    ) {
        let active = capacity as i64 + extra;
        let result = check_activation(from, Some(capacity), active);
        prop_assert_eq!(result, Err(RuleError::ClassFull { capacity }));
    }

    #[test]
    fn prop_activation_allowed_below_capacity(
        capacity in 1i32..60,
        from in prop_oneof![Just(EnrollmentStatus::Pending), Just(EnrollmentStatus::Waitlisted)],
        fill in 0.0f64..1.0,
    ) {
        let active = ((capacity as f64) * fill) as i64;
        prop_assume!(active < capacity as i64);
        prop_assert!(check_activation(from, Some(capacity), active).is_ok());
    }

    /// Staff enrollments go active only with room; parents always wait for approval
    #[test]
    fn prop_initial_status_respects_capacity(
        capacity in proptest::option::of(1i32..40),
        active in 0i64..50,
        by_parent in any::<bool>(),
    ) {
        let status = initial_status(capacity, active, by_parent);
        if by_parent {
            prop_assert_eq!(status, EnrollmentStatus::Pending);
        } else if has_capacity(capacity, active) {
            prop_assert_eq!(status, EnrollmentStatus::Active);
        } else {
            prop_assert_eq!(status, EnrollmentStatus::Waitlisted);
        }
    }

    #[test]
    fn prop_approval_never_overfills(capacity in 1i32..40, active in 0i64..50) {
        let status = approval_status(Some(capacity), active);
        if status == EnrollmentStatus::Active {
            prop_assert!(active < capacity as i64);
        } else {
            prop_assert_eq!(status, EnrollmentStatus::Waitlisted);
        }
    }

    /// Closed enrollments accept no transition
    #[test]
    fn prop_closed_enrollments_are_final(to in status_strategy()) {
        prop_assert!(!EnrollmentStatus::Dropped.can_transition(to));
        prop_assert!(!EnrollmentStatus::Cancelled.can_transition(to));
    }

    #[test]
    fn prop_waitlist_position_goes_to_back(current in proptest::option::of(1i32..500)) {
        let next = next_waitlist_position(current);
        prop_assert!(next >= 1);
        prop_assert!(next > current.unwrap_or(0));
    }
}

#[test]
fn test_unlimited_class_always_has_room() {
    assert!(has_capacity(None, 10_000));
    assert!(check_activation(EnrollmentStatus::Waitlisted, None, 10_000).is_ok());
}

#[test]
fn test_active_enrollment_can_only_drop() {
    assert!(EnrollmentStatus::Active.can_transition(EnrollmentStatus::Dropped));
    assert!(!EnrollmentStatus::Active.can_transition(EnrollmentStatus::Cancelled));
    assert!(!EnrollmentStatus::Active.can_transition(EnrollmentStatus::Waitlisted));
    assert!(matches!(
        check_activation(EnrollmentStatus::Active, Some(10), 0),
        Err(RuleError::InvalidTransition { .. })
    ));
}
