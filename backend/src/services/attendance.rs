//! Attendance tracking service

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{attendance_rate, meets_on, AttendanceStatus};

/// Attendance service
#[derive(Clone)]
pub struct AttendanceService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceMark {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Bulk attendance for one class session
#[derive(Debug, Deserialize)]
pub struct MarkAttendanceInput {
    pub session_date: NaiveDate,
    pub records: Vec<AttendanceMark>,
    /// Allow a date outside the regular weekly schedule (make-up class)
    #[serde(default)]
    pub makeup: bool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub class_id: Uuid,
    pub student_id: Uuid,
    pub session_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub marked_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a session sheet; `status` is empty until marked
#[derive(Debug, Serialize, FromRow)]
pub struct SessionSheetEntry {
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionSheet {
    pub class_id: Uuid,
    pub session_date: NaiveDate,
    pub entries: Vec<SessionSheetEntry>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SessionSummary {
    pub session_date: NaiveDate,
    pub present: i64,
    pub late: i64,
    pub absent: i64,
    pub excused: i64,
}

#[derive(Debug, Serialize)]
pub struct StudentAttendanceSummary {
    pub student_id: Uuid,
    pub sessions: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub excused: usize,
    /// Percent of non-excused sessions attended
    pub attendance_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl StudentAttendanceSummary {
    fn from_statuses(student_id: Uuid, statuses: &[AttendanceStatus]) -> Self {
        let count = |s: AttendanceStatus| statuses.iter().filter(|x| **x == s).count();
        Self {
            student_id,
            sessions: statuses.len(),
            present: count(AttendanceStatus::Present),
            late: count(AttendanceStatus::Late),
            absent: count(AttendanceStatus::Absent),
            excused: count(AttendanceStatus::Excused),
            attendance_rate: attendance_rate(statuses),
        }
    }
}

impl AttendanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record attendance for a session, replacing earlier marks.
    ///
    /// `instructor_staff_id` restricts the call to classes that staff member teaches.
    pub async fn mark_attendance(
        &self,
        studio_id: Uuid,
        class_id: Uuid,
        marked_by: Uuid,
        instructor_staff_id: Option<Uuid>,
        input: MarkAttendanceInput,
    ) -> AppResult<Vec<AttendanceRecord>> {
        if input.records.is_empty() {
            return Err(AppError::validation("records", "At least one attendance mark is required"));
        }
        if input.session_date > Utc::now().date_naive() {
            return Err(AppError::validation("session_date", "Cannot mark attendance for a future session"));
        }

        let (instructor_id, day_of_week, starts_on, ends_on) =
            sqlx::query_as::<_, (Option<Uuid>, i16, Option<NaiveDate>, Option<NaiveDate>)>(
                "SELECT instructor_id, day_of_week, starts_on, ends_on FROM classes WHERE id = $1 AND studio_id = $2",
            )
            .bind(class_id)
            .bind(studio_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Class".to_string()))?;

        if let Some(staff_id) = instructor_staff_id {
            if instructor_id != Some(staff_id) {
                return Err(AppError::InsufficientPermissions);
            }
        }

        if !input.makeup && !meets_on(day_of_week, starts_on, ends_on, input.session_date) {
            return Err(AppError::validation(
                "session_date",
                "Class does not meet on this date; mark it as a make-up session",
            ));
        }

        let enrolled: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT student_id FROM enrollments WHERE class_id = $1 AND status = 'active'",
        )
        .bind(class_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        if let Some(stranger) = input.records.iter().find(|r| !enrolled.contains(&r.student_id)) {
            return Err(AppError::validation(
                "records",
                format!("Student {} is not actively enrolled in this class", stranger.student_id),
            ));
        }

        let mut tx = self.db.begin().await?;
        let mut records = Vec::with_capacity(input.records.len());

        for mark in &input.records {
            let record = sqlx::query_as::<_, AttendanceRecord>(
                r#"
                INSERT INTO attendance_records (studio_id, class_id, student_id, session_date, status, notes, marked_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (class_id, student_id, session_date) DO UPDATE SET
                    status = EXCLUDED.status,
                    notes = EXCLUDED.notes,
                    marked_by = EXCLUDED.marked_by,
                    updated_at = NOW()
                RETURNING id, class_id, student_id, session_date, status, notes, marked_by, updated_at
                "#,
            )
            .bind(studio_id)
            .bind(class_id)
            .bind(mark.student_id)
            .bind(input.session_date)
            .bind(mark.status.as_str())
            .bind(&mark.notes)
            .bind(marked_by)
            .fetch_one(&mut *tx)
            .await?;
            records.push(record);
        }

        tx.commit().await?;

        tracing::info!(
            class_id = %class_id,
            session_date = %input.session_date,
            marks = records.len(),
            "Attendance recorded"
        );

        Ok(records)
    }

    /// Roster for one session with any marks already taken
    pub async fn session_sheet(
        &self,
        studio_id: Uuid,
        class_id: Uuid,
        session_date: NaiveDate,
    ) -> AppResult<SessionSheet> {
        let entries = sqlx::query_as::<_, SessionSheetEntry>(
            r#"
            SELECT st.id AS student_id, st.first_name, st.last_name, a.status, a.notes
            FROM enrollments e
            JOIN students st ON st.id = e.student_id
            LEFT JOIN attendance_records a
                   ON a.class_id = e.class_id AND a.student_id = e.student_id AND a.session_date = $3
            WHERE e.class_id = $1 AND e.studio_id = $2 AND e.status = 'active'
            ORDER BY st.last_name, st.first_name
            "#,
        )
        .bind(class_id)
        .bind(studio_id)
        .bind(session_date)
        .fetch_all(&self.db)
        .await?;

        Ok(SessionSheet {
            class_id,
            session_date,
            entries,
        })
    }

    /// Per-session counts for a class, newest first
    pub async fn list_sessions(
        &self,
        studio_id: Uuid,
        class_id: Uuid,
        range: &AttendanceRange,
    ) -> AppResult<Vec<SessionSummary>> {
        let sessions = sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT session_date,
                   COUNT(*) FILTER (WHERE status = 'present') AS present,
                   COUNT(*) FILTER (WHERE status = 'late') AS late,
                   COUNT(*) FILTER (WHERE status = 'absent') AS absent,
                   COUNT(*) FILTER (WHERE status = 'excused') AS excused
            FROM attendance_records
            WHERE class_id = $1 AND studio_id = $2
              AND ($3::date IS NULL OR session_date >= $3)
              AND ($4::date IS NULL OR session_date <= $4)
            GROUP BY session_date
            ORDER BY session_date DESC
            "#,
        )
        .bind(class_id)
        .bind(studio_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    /// Attendance totals and rate for one student
    pub async fn student_summary(
        &self,
        studio_id: Uuid,
        student_id: Uuid,
        range: &AttendanceRange,
    ) -> AppResult<StudentAttendanceSummary> {
        let raw = sqlx::query_scalar::<_, String>(
            r#"
            SELECT status FROM attendance_records
            WHERE student_id = $1 AND studio_id = $2
              AND ($3::date IS NULL OR session_date >= $3)
              AND ($4::date IS NULL OR session_date <= $4)
            "#,
        )
        .bind(student_id)
        .bind(studio_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.db)
        .await?;

        let statuses: Vec<AttendanceStatus> = raw.iter().filter_map(|s| AttendanceStatus::parse(s)).collect();
        Ok(StudentAttendanceSummary::from_statuses(student_id, &statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        use AttendanceStatus::*;
        let summary = StudentAttendanceSummary::from_statuses(
            Uuid::nil(),
            &[Present, Present, Late, Absent, Excused],
        );
        assert_eq!(summary.sessions, 5);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.excused, 1);
        assert_eq!(summary.attendance_rate, Some(Decimal::from(75)));
    }

    #[test]
    fn test_summary_empty() {
        let summary = StudentAttendanceSummary::from_statuses(Uuid::nil(), &[]);
        assert_eq!(summary.sessions, 0);
        assert_eq!(summary.attendance_rate, None);
    }

    #[test]
    fn test_mark_input_parses() {
        let input: MarkAttendanceInput = serde_json::from_str(
            r#"{"session_date":"2024-09-09","records":[{"student_id":"00000000-0000-0000-0000-000000000000","status":"late"}]}"#,
        )
        .unwrap();
        assert!(!input.makeup);
        assert_eq!(input.records[0].status, AttendanceStatus::Late);
    }
}
