//! Enrollment service: requests, approvals, waitlist and drops
//!
//! Every status change runs in a transaction that first locks the class row,
//! so concurrent approvals cannot push a class past its capacity.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    approval_status, check_activation, initial_status, next_waitlist_position, Enrollment,
    EnrollmentRow, EnrollmentStatus, ENROLLMENT_COLUMNS,
};

/// Enrollment service
#[derive(Clone)]
pub struct EnrollmentService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct EnrollInput {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentFilter {
    pub class_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub family_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
}

/// Enrollment joined with student and class names
#[derive(Debug, Serialize, FromRow)]
pub struct EnrollmentView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub family_id: Uuid,
    pub class_id: Uuid,
    pub class_name: String,
    pub status: String,
    pub waitlist_position: Option<i32>,
    pub notes: Option<String>,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One student on a class roster
#[derive(Debug, Serialize, FromRow)]
pub struct RosterEntry {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_notes: Option<String>,
    pub family_id: Uuid,
    pub family_name: String,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub status: String,
    pub waitlist_position: Option<i32>,
    pub enrolled_at: Option<DateTime<Utc>>,
}

/// Class roster grouped by status
#[derive(Debug, Serialize)]
pub struct ClassRoster {
    pub class_id: Uuid,
    pub capacity: Option<i32>,
    pub active: Vec<RosterEntry>,
    pub waitlisted: Vec<RosterEntry>,
    pub pending: Vec<RosterEntry>,
}

const VIEW_SELECT: &str = r#"
    SELECT e.id, e.student_id, st.first_name || ' ' || st.last_name AS student_name,
           st.family_id, e.class_id, c.name AS class_name, e.status, e.waitlist_position,
           e.notes, e.enrolled_at, e.ended_at, e.created_at
    FROM enrollments e
    JOIN students st ON st.id = e.student_id
    JOIN classes c ON c.id = e.class_id
"#;

impl EnrollmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn list_enrollments(
        &self,
        studio_id: Uuid,
        filter: &EnrollmentFilter,
    ) -> AppResult<Vec<EnrollmentView>> {
        let rows = sqlx::query_as::<_, EnrollmentView>(&format!(
            r#"{}
            WHERE e.studio_id = $1
              AND ($2::uuid IS NULL OR e.class_id = $2)
              AND ($3::uuid IS NULL OR e.student_id = $3)
              AND ($4::uuid IS NULL OR st.family_id = $4)
              AND ($5::text IS NULL OR e.status = $5)
            ORDER BY c.name, e.status, e.waitlist_position NULLS LAST, st.last_name
            "#,
            VIEW_SELECT
        ))
        .bind(studio_id)
        .bind(filter.class_id)
        .bind(filter.student_id)
        .bind(filter.family_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn get_enrollment(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1 AND studio_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))?;

        row.try_into()
    }

    /// Family that owns an enrollment, for portal ownership checks
    pub async fn enrollment_family(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT st.family_id FROM enrollments e
            JOIN students st ON st.id = e.student_id
            WHERE e.id = $1 AND e.studio_id = $2
            "#,
        )
        .bind(enrollment_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))
    }

    pub async fn class_roster(&self, studio_id: Uuid, class_id: Uuid) -> AppResult<ClassRoster> {
        let capacity = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT capacity FROM classes WHERE id = $1 AND studio_id = $2",
        )
        .bind(class_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Class".to_string()))?;

        let entries = sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT e.id AS enrollment_id, st.id AS student_id, st.first_name, st.last_name,
                   st.date_of_birth, st.medical_notes, f.id AS family_id, f.name AS family_name,
                   f.primary_email, f.primary_phone, e.status, e.waitlist_position, e.enrolled_at
            FROM enrollments e
            JOIN students st ON st.id = e.student_id
            JOIN families f ON f.id = st.family_id
            WHERE e.class_id = $1 AND e.studio_id = $2
              AND e.status IN ('active', 'waitlisted', 'pending')
            ORDER BY e.waitlist_position NULLS FIRST, st.last_name, st.first_name
            "#,
        )
        .bind(class_id)
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;

        let mut roster = ClassRoster {
            class_id,
            capacity,
            active: Vec::new(),
            waitlisted: Vec::new(),
            pending: Vec::new(),
        };
        for entry in entries {
            match EnrollmentStatus::parse(&entry.status) {
                Some(EnrollmentStatus::Active) => roster.active.push(entry),
                Some(EnrollmentStatus::Waitlisted) => roster.waitlisted.push(entry),
                Some(EnrollmentStatus::Pending) => roster.pending.push(entry),
                _ => {}
            }
        }

        Ok(roster)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Enroll a student. Staff enrollments are placed immediately (or
    /// waitlisted when full); parent requests wait for approval.
    pub async fn enroll(
        &self,
        studio_id: Uuid,
        input: EnrollInput,
        requested_by_parent: bool,
    ) -> AppResult<Enrollment> {
        let mut tx = self.db.begin().await?;

        let capacity = Self::lock_class(&mut tx, studio_id, input.class_id, true).await?;

        let student_active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM students WHERE id = $1 AND studio_id = $2",
        )
        .bind(input.student_id)
        .bind(studio_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Student".to_string()))?;

        if !student_active {
            return Err(AppError::validation("student_id", "Student is inactive"));
        }

        let existing = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 AND class_id = $2 FOR UPDATE",
            ENROLLMENT_COLUMNS
        ))
        .bind(input.student_id)
        .bind(input.class_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = &existing {
            if !row.status()?.is_closed() {
                return Err(AppError::Conflict {
                    resource: "enrollment".to_string(),
                    message: format!("Student is already {} in this class", row.status),
                });
            }
        }

        let active_count = Self::active_count(&mut tx, input.class_id).await?;
        let status = initial_status(capacity, active_count, requested_by_parent);
        let waitlist_position = match status {
            EnrollmentStatus::Waitlisted => Some(Self::next_position(&mut tx, input.class_id).await?),
            _ => None,
        };
        let enrolled_at = (status == EnrollmentStatus::Active).then(Utc::now);

        let row = match existing {
            // Re-enrolling reopens the closed row
            Some(row) => {
                sqlx::query_as::<_, EnrollmentRow>(&format!(
                    r#"
                    UPDATE enrollments SET status = $2, waitlist_position = $3, enrolled_at = $4,
                           ended_at = NULL, notes = $5, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ENROLLMENT_COLUMNS
                ))
                .bind(row.id)
                .bind(status.as_str())
                .bind(waitlist_position)
                .bind(enrolled_at)
                .bind(&input.notes)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, EnrollmentRow>(&format!(
                    r#"
                    INSERT INTO enrollments (studio_id, student_id, class_id, status,
                                             waitlist_position, enrolled_at, notes)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING {}
                    "#,
                    ENROLLMENT_COLUMNS
                ))
                .bind(studio_id)
                .bind(input.student_id)
                .bind(input.class_id)
                .bind(status.as_str())
                .bind(waitlist_position)
                .bind(enrolled_at)
                .bind(&input.notes)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        tracing::info!(
            studio_id = %studio_id,
            enrollment_id = %row.id,
            class_id = %input.class_id,
            status = %status,
            parent_request = requested_by_parent,
            "Enrollment created"
        );

        row.try_into()
    }

    /// Approve a pending request; a full class puts it on the waitlist
    pub async fn approve(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let class_id = self.get_enrollment(studio_id, enrollment_id).await?.class_id;
        let mut tx = self.db.begin().await?;

        let capacity = Self::lock_class(&mut tx, studio_id, class_id, false).await?;
        let current = Self::lock_enrollment(&mut tx, studio_id, enrollment_id).await?;
        if current.status()? != EnrollmentStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending requests can be approved (current status: {})",
                current.status
            )));
        }

        let active_count = Self::active_count(&mut tx, class_id).await?;
        let status = approval_status(capacity, active_count);

        let row = match status {
            EnrollmentStatus::Active => Self::activate(&mut tx, enrollment_id).await?,
            _ => {
                let position = Self::next_position(&mut tx, class_id).await?;
                sqlx::query_as::<_, EnrollmentRow>(&format!(
                    r#"
                    UPDATE enrollments SET status = 'waitlisted', waitlist_position = $2, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ENROLLMENT_COLUMNS
                ))
                .bind(enrollment_id)
                .bind(position)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        tracing::info!(enrollment_id = %enrollment_id, status = %status, "Enrollment approved");
        row.try_into()
    }

    /// Promote a specific waitlisted enrollment into the class
    pub async fn promote(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let class_id = self.get_enrollment(studio_id, enrollment_id).await?.class_id;
        let mut tx = self.db.begin().await?;

        let capacity = Self::lock_class(&mut tx, studio_id, class_id, false).await?;
        let current = Self::lock_enrollment(&mut tx, studio_id, enrollment_id).await?;
        if current.status()? != EnrollmentStatus::Waitlisted {
            return Err(AppError::InvalidStateTransition(format!(
                "Only waitlisted enrollments can be promoted (current status: {})",
                current.status
            )));
        }

        let active_count = Self::active_count(&mut tx, class_id).await?;
        check_activation(EnrollmentStatus::Waitlisted, capacity, active_count)?;

        let row = Self::activate(&mut tx, enrollment_id).await?;
        tx.commit().await?;

        tracing::info!(enrollment_id = %enrollment_id, class_id = %class_id, "Promoted from waitlist");
        row.try_into()
    }

    /// Promote the first student on the class waitlist
    pub async fn promote_next(&self, studio_id: Uuid, class_id: Uuid) -> AppResult<Enrollment> {
        let mut tx = self.db.begin().await?;

        let capacity = Self::lock_class(&mut tx, studio_id, class_id, false).await?;

        let next_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM enrollments
            WHERE class_id = $1 AND status = 'waitlisted'
            ORDER BY waitlist_position NULLS LAST, created_at
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(class_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Waitlisted enrollment".to_string()))?;

        let active_count = Self::active_count(&mut tx, class_id).await?;
        check_activation(EnrollmentStatus::Waitlisted, capacity, active_count)?;

        let row = Self::activate(&mut tx, next_id).await?;
        tx.commit().await?;

        tracing::info!(enrollment_id = %next_id, class_id = %class_id, "Promoted next from waitlist");
        row.try_into()
    }

    /// Drop an active student from a class
    pub async fn drop_enrollment(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Enrollment> {
        self.close(studio_id, enrollment_id, EnrollmentStatus::Dropped).await
    }

    /// Cancel a pending request or waitlist place
    pub async fn cancel(&self, studio_id: Uuid, enrollment_id: Uuid) -> AppResult<Enrollment> {
        self.close(studio_id, enrollment_id, EnrollmentStatus::Cancelled).await
    }

    async fn close(&self, studio_id: Uuid, enrollment_id: Uuid, to: EnrollmentStatus) -> AppResult<Enrollment> {
        let class_id = self.get_enrollment(studio_id, enrollment_id).await?.class_id;
        let mut tx = self.db.begin().await?;

        Self::lock_class(&mut tx, studio_id, class_id, false).await?;
        let current = Self::lock_enrollment(&mut tx, studio_id, enrollment_id).await?;
        current.status()?.transition(to)?;

        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            r#"
            UPDATE enrollments SET status = $2, waitlist_position = NULL, ended_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(enrollment_id = %enrollment_id, status = %to, "Enrollment closed");
        row.try_into()
    }

    // ========================================================================
    // Transaction helpers
    // ========================================================================

    /// Lock the class row and return its capacity
    async fn lock_class(
        tx: &mut Transaction<'_, Postgres>,
        studio_id: Uuid,
        class_id: Uuid,
        require_active: bool,
    ) -> AppResult<Option<i32>> {
        let (capacity, is_active) = sqlx::query_as::<_, (Option<i32>, bool)>(
            "SELECT capacity, is_active FROM classes WHERE id = $1 AND studio_id = $2 FOR UPDATE",
        )
        .bind(class_id)
        .bind(studio_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Class".to_string()))?;

        if require_active && !is_active {
            return Err(AppError::validation("class_id", "Class is not open for enrollment"));
        }
        Ok(capacity)
    }

    async fn lock_enrollment(
        tx: &mut Transaction<'_, Postgres>,
        studio_id: Uuid,
        enrollment_id: Uuid,
    ) -> AppResult<EnrollmentRow> {
        sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1 AND studio_id = $2 FOR UPDATE",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .bind(studio_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))
    }

    async fn active_count(tx: &mut Transaction<'_, Postgres>, class_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE class_id = $1 AND status = 'active'",
        )
        .bind(class_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    async fn next_position(tx: &mut Transaction<'_, Postgres>, class_id: Uuid) -> AppResult<i32> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(waitlist_position) FROM enrollments WHERE class_id = $1 AND status = 'waitlisted'",
        )
        .bind(class_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(next_waitlist_position(max))
    }

    async fn activate(tx: &mut Transaction<'_, Postgres>, enrollment_id: Uuid) -> AppResult<EnrollmentRow> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            r#"
            UPDATE enrollments SET status = 'active', waitlist_position = NULL,
                   enrolled_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }
}
