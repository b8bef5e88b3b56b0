//! Validation utilities for the Dance Studio Management Platform

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    Ok(())
}

/// Validate a phone number used for SMS delivery.
/// Accepts 10-15 digits with optional `+`, spaces, dashes, dots and brackets.
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let phone = phone.trim();
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
    {
        return Err("Phone number contains invalid characters");
    }
    if phone.chars().skip(1).any(|c| c == '+') {
        return Err("Phone number may only start with '+'");
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(10..=15).contains(&digits) {
        return Err("Phone number must have 10 to 15 digits");
    }
    Ok(())
}

/// Normalize a phone number to `+<digits>` form for the SMS gateway.
/// Ten-digit numbers are treated as North American.
pub fn normalize_phone(phone: &str) -> Option<String> {
    validate_phone(phone).ok()?;
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        Some(format!("+1{}", digits))
    } else {
        Some(format!("+{}", digits))
    }
}

/// Validate a studio slug (subdomain label)
pub fn validate_studio_slug(slug: &str) -> Result<(), &'static str> {
    if slug.len() < 3 {
        return Err("Studio slug must be at least 3 characters");
    }
    if slug.len() > 63 {
        return Err("Studio slug must be at most 63 characters");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Studio slug must be lowercase letters, digits or hyphens");
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("Studio slug cannot start or end with a hyphen");
    }
    Ok(())
}

// ============================================================================
// Scheduling & Money
// ============================================================================

/// Validate that a money amount is positive and has at most two decimals
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount cannot have more than two decimal places");
    }
    Ok(())
}

/// Validate an optional price where zero is allowed (free classes)
pub fn validate_price(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    if amount.normalize().scale() > 2 {
        return Err("Price cannot have more than two decimal places");
    }
    Ok(())
}

/// Validate a class time slot
pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> Result<(), &'static str> {
    if end <= start {
        return Err("End time must be after start time");
    }
    Ok(())
}

/// Validate an optional date range
pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), &'static str> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err("End date cannot be before start date"),
        _ => Ok(()),
    }
}

/// Validate class capacity (None means unlimited)
pub fn validate_capacity(capacity: Option<i32>) -> Result<(), &'static str> {
    match capacity {
        Some(c) if c < 1 => Err("Capacity must be at least 1"),
        Some(c) if c > 500 => Err("Capacity cannot exceed 500"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("parent@example.com").is_ok());
        assert!(validate_email("  front.desk@studio.dance ").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("user@.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("plie2024").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("nodigitshere").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("(555) 123-4567").is_ok());
        assert!(validate_phone("+44 20 7946 0958").is_ok());
        assert!(validate_phone("555-1234").is_err());
        assert!(validate_phone("555-123-4567 ext").is_err());
        assert!(validate_phone("55+5123456789").is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(555) 123-4567"), Some("+15551234567".to_string()));
        assert_eq!(normalize_phone("+44 20 7946 0958"), Some("+442079460958".to_string()));
        assert_eq!(normalize_phone("12"), None);
    }

    #[test]
    fn test_validate_studio_slug() {
        assert!(validate_studio_slug("tutu-town").is_ok());
        assert!(validate_studio_slug("studio42").is_ok());
        assert!(validate_studio_slug("TutuTown").is_err());
        assert!(validate_studio_slug("tutu_town").is_err());
        assert!(validate_studio_slug("tutu-").is_err());
        assert!(validate_studio_slug("ab").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::from_str("120.50").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("120.500").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("0").unwrap()).is_err());
        assert!(validate_amount(Decimal::from_str("-5").unwrap()).is_err());
        assert!(validate_amount(Decimal::from_str("1.005").unwrap()).is_err());
    }

    #[test]
    fn test_validate_price_allows_zero() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::from_str("-0.01").unwrap()).is_err());
    }

    #[test]
    fn test_validate_time_range() {
        let four = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert!(validate_time_range(four, five).is_ok());
        assert!(validate_time_range(five, four).is_err());
        assert!(validate_time_range(four, four).is_err());
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(None).is_ok());
        assert!(validate_capacity(Some(12)).is_ok());
        assert!(validate_capacity(Some(0)).is_err());
        assert!(validate_capacity(Some(501)).is_err());
    }
}
