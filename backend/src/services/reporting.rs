//! Reporting service for the admin dashboard and CSV exports

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub active_students: i64,
    pub active_families: i64,
    pub active_classes: i64,
    pub active_enrollments: i64,
    pub waitlisted_enrollments: i64,
    pub pending_enrollments: i64,
    pub outstanding_balance: Decimal,
    pub overdue_balance: Decimal,
    pub overdue_invoices: i64,
    pub revenue_this_month: Decimal,
    /// Attendance rate over the last 30 days, percent
    pub attendance_rate_30d: Option<Decimal>,
    pub scheduled_messages: i64,
}

/// Class roster export row
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RosterExportRow {
    pub class_name: String,
    pub student_first_name: String,
    pub student_last_name: String,
    pub family_name: String,
    pub family_email: Option<String>,
    pub family_phone: Option<String>,
    pub status: String,
    pub waitlist_position: Option<i32>,
}

/// Outstanding invoice export row
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OutstandingInvoiceRow {
    pub invoice_number: String,
    pub family_name: String,
    pub family_email: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub days_overdue: i32,
}

/// Capacity use per class
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ClassUtilization {
    pub class_id: Uuid,
    pub class_name: String,
    pub level: Option<String>,
    pub capacity: Option<i32>,
    pub active: i64,
    pub waitlisted: i64,
    pub fill_percent: Option<Decimal>,
}

/// Payments collected per month
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RevenuePoint {
    pub period: String,
    pub collected: Decimal,
    pub refunded: Decimal,
    pub payment_count: i64,
}

/// Report filter parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub class_id: Option<Uuid>,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get dashboard metrics
    pub async fn get_dashboard_metrics(&self, studio_id: Uuid) -> AppResult<DashboardMetrics> {
        let (active_students, active_families): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT family_id)
            FROM students WHERE studio_id = $1 AND is_active
            "#,
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        let active_classes: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE studio_id = $1 AND is_active")
                .bind(studio_id)
                .fetch_one(&self.db)
                .await?;

        let (active_enrollments, waitlisted_enrollments, pending_enrollments): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE status = 'waitlisted'),
                COUNT(*) FILTER (WHERE status = 'pending')
            FROM enrollments WHERE studio_id = $1
            "#,
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        let (outstanding_balance, overdue_balance, overdue_invoices): (Decimal, Decimal, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(total - amount_paid), 0),
                COALESCE(SUM(total - amount_paid) FILTER (WHERE due_date < CURRENT_DATE), 0),
                COUNT(*) FILTER (WHERE due_date < CURRENT_DATE)
            FROM invoices
            WHERE studio_id = $1 AND status IN ('open', 'partially_paid')
            "#,
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        // Payments collected since the first of the month
        let revenue_this_month: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount - refunded_amount), 0) FROM payments
            WHERE studio_id = $1 AND status <> 'failed'
              AND paid_at >= date_trunc('month', NOW())
            "#,
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        let attendance_rate_30d: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT ROUND(
                100.0 * COUNT(*) FILTER (WHERE status IN ('present', 'late'))
                / NULLIF(COUNT(*) FILTER (WHERE status <> 'excused'), 0), 1)
            FROM attendance_records
            WHERE studio_id = $1 AND session_date >= CURRENT_DATE - INTERVAL '30 days'
            "#,
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        let scheduled_messages: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM scheduled_messages WHERE studio_id = $1 AND status = 'scheduled'",
        )
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardMetrics {
            active_students,
            active_families,
            active_classes,
            active_enrollments,
            waitlisted_enrollments,
            pending_enrollments,
            outstanding_balance,
            overdue_balance,
            overdue_invoices,
            revenue_this_month,
            attendance_rate_30d,
            scheduled_messages,
        })
    }

    /// Roster rows for one class, or every active class
    pub async fn class_roster_export(&self, studio_id: Uuid, filter: &ReportFilter) -> AppResult<Vec<RosterExportRow>> {
        let rows = sqlx::query_as::<_, RosterExportRow>(
            r#"
            SELECT c.name AS class_name, st.first_name AS student_first_name, st.last_name AS student_last_name,
                   f.name AS family_name, f.primary_email AS family_email, f.primary_phone AS family_phone,
                   e.status, e.waitlist_position
            FROM enrollments e
            JOIN classes c ON c.id = e.class_id
            JOIN students st ON st.id = e.student_id
            JOIN families f ON f.id = st.family_id
            WHERE e.studio_id = $1
              AND e.status IN ('active', 'waitlisted', 'pending')
              AND ($2::uuid IS NULL OR e.class_id = $2)
              AND ($2::uuid IS NOT NULL OR c.is_active)
            ORDER BY c.name, e.status, e.waitlist_position NULLS FIRST, st.last_name, st.first_name
            "#,
        )
        .bind(studio_id)
        .bind(filter.class_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Unpaid invoices, most overdue first
    pub async fn outstanding_invoices(&self, studio_id: Uuid) -> AppResult<Vec<OutstandingInvoiceRow>> {
        let rows = sqlx::query_as::<_, OutstandingInvoiceRow>(
            r#"
            SELECT i.invoice_number, f.name AS family_name, f.primary_email AS family_email,
                   i.issue_date, i.due_date, i.total, i.amount_paid,
                   i.total - i.amount_paid AS balance_due,
                   GREATEST(CURRENT_DATE - i.due_date, 0) AS days_overdue
            FROM invoices i
            JOIN families f ON f.id = i.family_id
            WHERE i.studio_id = $1 AND i.status IN ('open', 'partially_paid')
            ORDER BY i.due_date, i.invoice_number
            "#,
        )
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn class_utilization(&self, studio_id: Uuid) -> AppResult<Vec<ClassUtilization>> {
        let rows = sqlx::query_as::<_, ClassUtilization>(
            r#"
            SELECT c.id AS class_id, c.name AS class_name, c.level, c.capacity,
                   COUNT(e.id) FILTER (WHERE e.status = 'active') AS active,
                   COUNT(e.id) FILTER (WHERE e.status = 'waitlisted') AS waitlisted,
                   ROUND(100.0 * COUNT(e.id) FILTER (WHERE e.status = 'active') / NULLIF(c.capacity, 0), 1)
                       AS fill_percent
            FROM classes c
            LEFT JOIN enrollments e ON e.class_id = c.id
            WHERE c.studio_id = $1 AND c.is_active
            GROUP BY c.id
            ORDER BY c.day_of_week, c.start_time
            "#,
        )
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn revenue_by_month(&self, studio_id: Uuid, filter: &ReportFilter) -> AppResult<Vec<RevenuePoint>> {
        let start = filter
            .start_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive() - chrono::Duration::days(365));
        let end = filter.end_date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        if end < start {
            return Err(AppError::validation("end_date", "End date must be on or after start date"));
        }

        let rows = sqlx::query_as::<_, RevenuePoint>(
            r#"
            SELECT TO_CHAR(paid_at, 'YYYY-MM') AS period,
                   COALESCE(SUM(amount), 0) AS collected,
                   COALESCE(SUM(refunded_amount), 0) AS refunded,
                   COUNT(*) AS payment_count
            FROM payments
            WHERE studio_id = $1 AND status <> 'failed'
              AND paid_at::date BETWEEN $2 AND $3
            GROUP BY period
            ORDER BY period
            "#,
        )
        .bind(studio_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_outstanding_csv() {
        let rows = vec![OutstandingInvoiceRow {
            invoice_number: "INV-2024-00007".into(),
            family_name: "Okafor, Ada".into(),
            family_email: None,
            issue_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 9, 15).unwrap(),
            total: Decimal::new(12000, 2),
            amount_paid: Decimal::new(5000, 2),
            balance_due: Decimal::new(7000, 2),
            days_overdue: 3,
        }];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("invoice_number,family_name,family_email,issue_date,due_date,total,amount_paid,balance_due,days_overdue")
        );
        assert_eq!(
            lines.next(),
            Some("INV-2024-00007,\"Okafor, Ada\",,2024-09-01,2024-09-15,120.00,50.00,70.00,3")
        );
    }

    #[test]
    fn test_export_empty() {
        let rows: Vec<RosterExportRow> = Vec::new();
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
