//! Billing rule tests
//!
//! Property-based and unit tests for:
//! - Invoice balance bookkeeping across payment sequences
//! - Overpayment rejection and refund reversal
//! - Recurring billing date advancement

use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    advance_anchored_billing_date, advance_billing_date, apply_payment, balance_due, invoice_total, is_overdue, reverse_payment,
    BillingInterval, InvoiceStatus,
};
use shared::RuleError;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Invoice totals between $0.01 and $5,000.00, in cents
fn total_cents_strategy() -> impl Strategy<Value = i64> {
    1i64..500_000
}

fn payment_sequence_strategy() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(1i64..200_000, 1..12)
}

/// Any date between 2000 and 2099
fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..36_500).prop_map(|offset| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(offset))
}

fn interval_strategy() -> impl Strategy<Value = BillingInterval> {
    prop_oneof![
        Just(BillingInterval::Weekly),
        Just(BillingInterval::Monthly),
        Just(BillingInterval::Quarterly),
        Just(BillingInterval::Annually),
    ]
}

fn expected_status(total: Decimal, paid: Decimal) -> InvoiceStatus {
    if paid >= total {
        InvoiceStatus::Paid
    } else if paid > Decimal::ZERO {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Open
    }
}

// ============================================================================
// Payment bookkeeping
// ============================================================================

proptest! {
    /// amount_paid + balance_due stays equal to the total and overpayments never land
    #[test]
    fn prop_payments_keep_balance_consistent(
        total_cents in total_cents_strategy(),
        payments in payment_sequence_strategy(),
    ) {
        let total = Decimal::new(total_cents, 2);
        let mut paid = Decimal::ZERO;
        let mut status = InvoiceStatus::Open;

        for cents in payments {
            let payment = Decimal::new(cents, 2);
            let balance = balance_due(total, paid);

            match apply_payment(status, total, paid, payment) {
                Ok((new_paid, new_status)) => {
                    prop_assert!(payment <= balance);
                    paid = new_paid;
                    status = new_status;
                }
                Err(RuleError::Overpayment { .. }) => prop_assert!(payment > balance),
                Err(RuleError::InvalidTransition { .. }) => prop_assert_eq!(status, InvoiceStatus::Paid),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }

            prop_assert_eq!(paid + balance_due(total, paid), total);
            prop_assert!(paid <= total);
            prop_assert_eq!(status, expected_status(total, paid));
        }
    }

    /// Refunds reopen the invoice and never push amount_paid below zero
    #[test]
    fn prop_refund_reverses_payment(
        total_cents in total_cents_strategy(),
        paid_fraction in 1u32..=100,
        refund_cents in 1i64..600_000,
    ) {
        let total = Decimal::new(total_cents, 2);
        let paid = (total * Decimal::from(paid_fraction) / Decimal::from(100)).round_dp(2);
        prop_assume!(paid > Decimal::ZERO);
        let status = expected_status(total, paid);
        let refund = Decimal::new(refund_cents, 2);

        let (new_paid, new_status) = reverse_payment(status, total, paid, refund);

        prop_assert!(new_paid >= Decimal::ZERO);
        prop_assert!(new_paid <= paid);
        prop_assert_eq!(new_status, expected_status(total, new_paid));
        prop_assert_eq!(new_paid + balance_due(total, new_paid), total);
    }
}

#[test]
fn test_void_invoice_refuses_payments() {
    let result = apply_payment(InvoiceStatus::Void, Decimal::new(5000, 2), Decimal::ZERO, Decimal::ONE);
    assert!(matches!(result, Err(RuleError::InvalidTransition { .. })));
}

#[test]
fn test_zero_payment_rejected() {
    let result = apply_payment(InvoiceStatus::Open, Decimal::new(5000, 2), Decimal::ZERO, Decimal::ZERO);
    assert!(matches!(result, Err(RuleError::Invalid(_))));
}

#[test]
fn test_payment_on_draft_issues_it() {
    let (paid, status) =
        apply_payment(InvoiceStatus::Draft, Decimal::new(9000, 2), Decimal::ZERO, Decimal::new(4000, 2)).unwrap();
    assert_eq!(paid, Decimal::new(4000, 2));
    assert_eq!(status, InvoiceStatus::PartiallyPaid);
}

#[test]
fn test_invoice_total_rounds_to_cents() {
    let lines = [(2, Decimal::new(4250, 2)), (1, Decimal::new(1999, 3))];
    assert_eq!(invoice_total(&lines), Decimal::new(8700, 2));
}

#[test]
fn test_overdue_only_for_unpaid_past_due() {
    let due = NaiveDate::from_ymd_opt(2024, 9, 15).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 9, 16).unwrap();
    assert!(is_overdue(InvoiceStatus::Open, due, today));
    assert!(is_overdue(InvoiceStatus::PartiallyPaid, due, today));
    assert!(!is_overdue(InvoiceStatus::Paid, due, today));
    assert!(!is_overdue(InvoiceStatus::Open, due, due));
}

// ============================================================================
// Billing dates
// ============================================================================

proptest! {
    #[test]
    fn prop_billing_date_strictly_increases(date in date_strategy(), interval in interval_strategy()) {
        let next = advance_billing_date(date, interval);
        prop_assert!(next > date);
    }

    /// Month-based intervals keep the day of month, clamped to the month end
    #[test]
    fn prop_monthly_advance_clamps_day(date in date_strategy()) {
        let next = advance_billing_date(date, BillingInterval::Monthly);
        prop_assert_eq!(next.month(), date.month() % 12 + 1);
        prop_assert!(next.day() <= date.day());
        if next.day() < date.day() {
            // Clamped: the next day is already in the following month
            prop_assert_ne!((next + Duration::days(1)).month(), next.month());
        }
    }

    /// Chained month-based billing returns to the anchor day whenever the month allows it
    #[test]
    fn prop_anchored_billing_keeps_anchor_day(anchor in 1u32..=31, steps in 1usize..30) {
        let start = NaiveDate::from_ymd_opt(2024, 1, anchor.min(31)).unwrap();
        let mut date = start;
        for _ in 0..steps {
            let next = advance_anchored_billing_date(date, BillingInterval::Monthly, anchor);
            prop_assert!(next > date);
            let fits = next.with_day(anchor).is_some();
            if fits {
                prop_assert_eq!(next.day(), anchor);
            } else {
                prop_assert_ne!((next + Duration::days(1)).month(), next.month());
            }
            date = next;
        }
    }

    #[test]
    fn prop_weekly_advance_is_seven_days(date in date_strategy()) {
        prop_assert_eq!(advance_billing_date(date, BillingInterval::Weekly) - date, Duration::days(7));
    }
}

#[test]
fn test_month_end_clamping() {
    let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    assert_eq!(
        advance_billing_date(jan31, BillingInterval::Monthly),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    );
    let nov30 = NaiveDate::from_ymd_opt(2023, 11, 30).unwrap();
    assert_eq!(
        advance_billing_date(nov30, BillingInterval::Quarterly),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    );
    let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(
        advance_billing_date(leap, BillingInterval::Annually),
        NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
    );
}
