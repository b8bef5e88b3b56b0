//! Billing models: invoices, payments and tuition plans

use chrono::{Datelike, Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

// ============================================================================
// Invoices
// ============================================================================

/// Invoice status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    PartiallyPaid,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "open" => Some(InvoiceStatus::Open),
            "partially_paid" => Some(InvoiceStatus::PartiallyPaid),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }

    /// Whether payments may still be applied
    pub fn accepts_payments(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Open | InvoiceStatus::PartiallyPaid
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining balance on an invoice. `amount_paid + balance_due == total`.
pub fn balance_due(total: Decimal, amount_paid: Decimal) -> Decimal {
    total - amount_paid
}

/// Derive the invoice status from its amounts
pub fn derive_invoice_status(
    current: InvoiceStatus,
    total: Decimal,
    amount_paid: Decimal,
) -> InvoiceStatus {
    if current == InvoiceStatus::Void {
        return InvoiceStatus::Void;
    }
    if amount_paid > Decimal::ZERO && amount_paid >= total {
        InvoiceStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        InvoiceStatus::PartiallyPaid
    } else if current == InvoiceStatus::Draft {
        InvoiceStatus::Draft
    } else {
        InvoiceStatus::Open
    }
}

/// Apply a payment to an invoice, returning the new amount paid and status.
/// Payments larger than the remaining balance are rejected.
pub fn apply_payment(
    current: InvoiceStatus,
    total: Decimal,
    amount_paid: Decimal,
    payment: Decimal,
) -> Result<(Decimal, InvoiceStatus), RuleError> {
    if !current.accepts_payments() {
        return Err(RuleError::InvalidTransition {
            from: current.as_str().to_string(),
            to: InvoiceStatus::Paid.as_str().to_string(),
        });
    }
    if payment <= Decimal::ZERO {
        return Err(RuleError::Invalid("Payment amount must be greater than zero"));
    }

    let balance = balance_due(total, amount_paid);
    if payment > balance {
        return Err(RuleError::Overpayment {
            amount: payment.to_string(),
            balance: balance.to_string(),
        });
    }

    let new_paid = amount_paid + payment;
    // A payment moves a draft invoice out of draft
    let base = if current == InvoiceStatus::Draft {
        InvoiceStatus::Open
    } else {
        current
    };
    Ok((new_paid, derive_invoice_status(base, total, new_paid)))
}

/// Reverse a refunded payment. The amount paid never drops below zero.
pub fn reverse_payment(
    current: InvoiceStatus,
    total: Decimal,
    amount_paid: Decimal,
    refunded: Decimal,
) -> (Decimal, InvoiceStatus) {
    let new_paid = (amount_paid - refunded).max(Decimal::ZERO);
    let base = if current == InvoiceStatus::Paid || current == InvoiceStatus::PartiallyPaid {
        InvoiceStatus::Open
    } else {
        current
    };
    (new_paid, derive_invoice_status(base, total, new_paid))
}

/// Whether an invoice is past due on `today`
pub fn is_overdue(status: InvoiceStatus, due_date: NaiveDate, today: NaiveDate) -> bool {
    matches!(status, InvoiceStatus::Open | InvoiceStatus::PartiallyPaid) && due_date < today
}

/// Sum line item amounts (quantity × unit price), rounded to cents
pub fn invoice_total(lines: &[(i32, Decimal)]) -> Decimal {
    lines
        .iter()
        .map(|(qty, price)| Decimal::from(*qty) * *price)
        .sum::<Decimal>()
        .round_dp(2)
}

/// Human-readable invoice number: INV-YYYY-NNNNN
pub fn format_invoice_number(year: i32, sequence: i64) -> String {
    format!("INV-{}-{:05}", year, sequence)
}

/// Convert an amount in minor units (cents) to a decimal amount
pub fn cents_to_amount(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ============================================================================
// Payments
// ============================================================================

/// How a payment was made
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Check,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Other => "other",
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

// ============================================================================
// Tuition Plans
// ============================================================================

/// Recurring billing interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Weekly => "weekly",
            BillingInterval::Monthly => "monthly",
            BillingInterval::Quarterly => "quarterly",
            BillingInterval::Annually => "annually",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(BillingInterval::Weekly),
            "monthly" => Some(BillingInterval::Monthly),
            "quarterly" => Some(BillingInterval::Quarterly),
            "annually" => Some(BillingInterval::Annually),
            _ => None,
        }
    }
}

/// Next billing date after `date`. Month-based intervals clamp to the end
/// of shorter months (Jan 31 + 1 month = Feb 28/29).
pub fn advance_billing_date(date: NaiveDate, interval: BillingInterval) -> NaiveDate {
    advance_anchored_billing_date(date, interval, date.day())
}

/// Next billing date for a plan billed on `anchor_day` of the month.
///
/// Month-based intervals land on the anchor day, clamped to the end of
/// shorter months, so an anchor of 31 bills Jan 31, Feb 29, Mar 31.
/// Weekly plans ignore the anchor.
pub fn advance_anchored_billing_date(date: NaiveDate, interval: BillingInterval, anchor_day: u32) -> NaiveDate {
    let months = match interval {
        BillingInterval::Weekly => return date + Duration::days(7),
        BillingInterval::Monthly => 1,
        BillingInterval::Quarterly => 3,
        BillingInterval::Annually => 12,
    };
    let first = date.with_day(1).unwrap_or(date);
    match first.checked_add_months(Months::new(months)) {
        Some(month) => {
            let day = anchor_day.clamp(1, days_in_month(month));
            month.with_day(day).unwrap_or(month)
        }
        None => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    (28..=31).rev().find(|d| date.with_day(*d).is_some()).unwrap_or(28)
}

/// Tuition plan status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TuitionPlanStatus {
    Active,
    PastDue,
    Paused,
    Cancelled,
    Incomplete,
}

impl TuitionPlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TuitionPlanStatus::Active => "active",
            TuitionPlanStatus::PastDue => "past_due",
            TuitionPlanStatus::Paused => "paused",
            TuitionPlanStatus::Cancelled => "cancelled",
            TuitionPlanStatus::Incomplete => "incomplete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TuitionPlanStatus::Active),
            "past_due" => Some(TuitionPlanStatus::PastDue),
            "paused" => Some(TuitionPlanStatus::Paused),
            "cancelled" => Some(TuitionPlanStatus::Cancelled),
            "incomplete" => Some(TuitionPlanStatus::Incomplete),
            _ => None,
        }
    }

    /// Map a payment provider subscription status onto a local plan status
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "active" | "trialing" => Some(TuitionPlanStatus::Active),
            "past_due" | "unpaid" => Some(TuitionPlanStatus::PastDue),
            "paused" => Some(TuitionPlanStatus::Paused),
            "canceled" | "cancelled" | "incomplete_expired" => Some(TuitionPlanStatus::Cancelled),
            "incomplete" => Some(TuitionPlanStatus::Incomplete),
            _ => None,
        }
    }
}

impl std::fmt::Display for TuitionPlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_roundtrip() {
        for s in ["draft", "open", "partially_paid", "paid", "void"] {
            assert_eq!(InvoiceStatus::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_derive_status() {
        let total = dec("150.00");
        assert_eq!(derive_invoice_status(InvoiceStatus::Open, total, Decimal::ZERO), InvoiceStatus::Open);
        assert_eq!(derive_invoice_status(InvoiceStatus::Draft, total, Decimal::ZERO), InvoiceStatus::Draft);
        assert_eq!(derive_invoice_status(InvoiceStatus::Open, total, dec("50")), InvoiceStatus::PartiallyPaid);
        assert_eq!(derive_invoice_status(InvoiceStatus::Open, total, total), InvoiceStatus::Paid);
        assert_eq!(derive_invoice_status(InvoiceStatus::Void, total, total), InvoiceStatus::Void);
    }

    #[test]
    fn test_zero_total_invoice_stays_open() {
        assert_eq!(
            derive_invoice_status(InvoiceStatus::Open, Decimal::ZERO, Decimal::ZERO),
            InvoiceStatus::Open
        );
    }

    #[test]
    fn test_apply_payment_partial_then_full() {
        let total = dec("200.00");
        let (paid, status) = apply_payment(InvoiceStatus::Open, total, Decimal::ZERO, dec("75.00")).unwrap();
        assert_eq!(paid, dec("75.00"));
        assert_eq!(status, InvoiceStatus::PartiallyPaid);
        assert_eq!(paid + balance_due(total, paid), total);

        let (paid, status) = apply_payment(status, total, paid, dec("125.00")).unwrap();
        assert_eq!(paid, total);
        assert_eq!(status, InvoiceStatus::Paid);
        assert_eq!(balance_due(total, paid), Decimal::ZERO);
    }

    #[test]
    fn test_apply_payment_moves_draft_to_open() {
        let (_, status) = apply_payment(InvoiceStatus::Draft, dec("100"), Decimal::ZERO, dec("10")).unwrap();
        assert_eq!(status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let err = apply_payment(InvoiceStatus::Open, dec("100"), dec("90"), dec("10.01")).unwrap_err();
        assert!(matches!(err, RuleError::Overpayment { .. }));
    }

    #[test]
    fn test_payment_on_void_or_paid_rejected() {
        assert!(apply_payment(InvoiceStatus::Void, dec("100"), Decimal::ZERO, dec("10")).is_err());
        assert!(apply_payment(InvoiceStatus::Paid, dec("100"), dec("100"), dec("1")).is_err());
    }

    #[test]
    fn test_reverse_payment() {
        let (paid, status) = reverse_payment(InvoiceStatus::Paid, dec("100"), dec("100"), dec("40"));
        assert_eq!(paid, dec("60"));
        assert_eq!(status, InvoiceStatus::PartiallyPaid);

        let (paid, status) = reverse_payment(InvoiceStatus::Paid, dec("100"), dec("100"), dec("250"));
        assert_eq!(paid, Decimal::ZERO);
        assert_eq!(status, InvoiceStatus::Open);
    }

    #[test]
    fn test_is_overdue() {
        let today = date(2024, 10, 15);
        assert!(is_overdue(InvoiceStatus::Open, date(2024, 10, 14), today));
        assert!(!is_overdue(InvoiceStatus::Open, today, today));
        assert!(!is_overdue(InvoiceStatus::Paid, date(2024, 1, 1), today));
        assert!(!is_overdue(InvoiceStatus::Draft, date(2024, 1, 1), today));
    }

    #[test]
    fn test_invoice_total() {
        let lines = vec![(1, dec("85.00")), (2, dec("12.50"))];
        assert_eq!(invoice_total(&lines), dec("110.00"));
        assert_eq!(invoice_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_format_invoice_number() {
        assert_eq!(format_invoice_number(2024, 7), "INV-2024-00007");
        assert_eq!(format_invoice_number(2025, 123456), "INV-2025-123456");
    }

    #[test]
    fn test_cents_to_amount() {
        assert_eq!(cents_to_amount(12345), dec("123.45"));
        assert_eq!(cents_to_amount(0), Decimal::ZERO);
    }

    #[test]
    fn test_advance_billing_date() {
        assert_eq!(advance_billing_date(date(2024, 1, 31), BillingInterval::Monthly), date(2024, 2, 29));
        assert_eq!(advance_billing_date(date(2023, 1, 31), BillingInterval::Monthly), date(2023, 2, 28));
        assert_eq!(advance_billing_date(date(2024, 11, 15), BillingInterval::Quarterly), date(2025, 2, 15));
        assert_eq!(advance_billing_date(date(2024, 2, 29), BillingInterval::Annually), date(2025, 2, 28));
        assert_eq!(advance_billing_date(date(2024, 12, 30), BillingInterval::Weekly), date(2025, 1, 6));
    }

    #[test]
    fn test_anchored_month_end_does_not_drift() {
        let mut d = date(2024, 1, 31);
        let mut seen = Vec::new();
        for _ in 0..4 {
            d = advance_anchored_billing_date(d, BillingInterval::Monthly, 31);
            seen.push(d);
        }
        assert_eq!(seen, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30), date(2024, 5, 31)]);

        assert_eq!(
            advance_anchored_billing_date(date(2024, 2, 29), BillingInterval::Quarterly, 30),
            date(2024, 5, 30)
        );
        assert_eq!(
            advance_anchored_billing_date(date(2024, 3, 10), BillingInterval::Weekly, 31),
            date(2024, 3, 17)
        );
    }

    #[test]
    fn test_plan_status_from_provider() {
        assert_eq!(TuitionPlanStatus::from_provider("trialing"), Some(TuitionPlanStatus::Active));
        assert_eq!(TuitionPlanStatus::from_provider("unpaid"), Some(TuitionPlanStatus::PastDue));
        assert_eq!(TuitionPlanStatus::from_provider("canceled"), Some(TuitionPlanStatus::Cancelled));
        assert_eq!(TuitionPlanStatus::from_provider("incomplete_expired"), Some(TuitionPlanStatus::Cancelled));
        assert_eq!(TuitionPlanStatus::from_provider("mystery"), None);
    }
}
