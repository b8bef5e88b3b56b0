//! Attendance models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Attendance mark for one student at one class session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }

    /// Late arrivals still count as attended
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// Attendance rate in percent (two decimals).
///
/// Excused absences are left out of the denominator. Returns `None` when
/// there is nothing to measure.
pub fn attendance_rate(statuses: &[AttendanceStatus]) -> Option<Decimal> {
    let counted: Vec<_> = statuses
        .iter()
        .filter(|s| **s != AttendanceStatus::Excused)
        .collect();
    if counted.is_empty() {
        return None;
    }
    let attended = counted.iter().filter(|s| s.counts_as_attended()).count();
    let rate = Decimal::from(attended as i64) * Decimal::from(100) / Decimal::from(counted.len() as i64);
    Some(rate.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_attendance_rate() {
        use AttendanceStatus::*;
        assert_eq!(attendance_rate(&[]), None);
        assert_eq!(attendance_rate(&[Excused, Excused]), None);
        assert_eq!(attendance_rate(&[Present, Late, Absent, Excused]), Some(Decimal::from_str("66.67").unwrap()));
        assert_eq!(attendance_rate(&[Present, Present]), Some(Decimal::from(100)));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AttendanceStatus::parse("late"), Some(AttendanceStatus::Late));
        assert_eq!(AttendanceStatus::parse("tardy"), None);
    }
}
