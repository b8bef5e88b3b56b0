//! Family and student management service

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::PaymentProviderClient;
use crate::models::{
    age_on, normalize_tags, Family, FamilyRow, Student, StudentRow, FAMILY_COLUMNS, STUDENT_COLUMNS,
};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{normalize_phone, validate_phone};

/// Family service
#[derive(Clone)]
pub struct FamilyService {
    db: PgPool,
}

/// Family with its students
#[derive(Debug, Serialize)]
pub struct FamilyDetail {
    #[serde(flatten)]
    pub family: Family,
    pub students: Vec<StudentView>,
}

/// Student with derived age
#[derive(Debug, Serialize)]
pub struct StudentView {
    #[serde(flatten)]
    pub student: Student,
    pub age: Option<u32>,
}

impl StudentView {
    fn new(student: Student, today: NaiveDate) -> Self {
        let age = student.date_of_birth.and_then(|dob| age_on(dob, today));
        Self { student, age }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FamilyFilter {
    /// Case-insensitive match on family name or email
    pub search: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFamilyInput {
    #[validate(length(min = 1, max = 200, message = "Family name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFamilyInput {
    #[validate(length(min = 1, max = 200, message = "Family name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub address: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentInput {
    /// Ignored on the parent portal, where the family is the caller's own
    pub family_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudentInput {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_notes: Option<String>,
    pub is_active: Option<bool>,
}

impl FamilyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Families
    // ========================================================================

    pub async fn list_families(
        &self,
        studio_id: Uuid,
        filter: &FamilyFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Family>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let tag = filter.tag.as_ref().and_then(|t| normalize_tags(&[t.clone()]).pop());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM families
            WHERE studio_id = $1
              AND ($2::text IS NULL OR LOWER(name) LIKE $2 OR LOWER(primary_email) LIKE $2)
              AND ($3::text IS NULL OR $3 = ANY(tags))
            "#,
        )
        .bind(studio_id)
        .bind(&search)
        .bind(&tag)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, FamilyRow>(&format!(
            r#"
            SELECT {} FROM families
            WHERE studio_id = $1
              AND ($2::text IS NULL OR LOWER(name) LIKE $2 OR LOWER(primary_email) LIKE $2)
              AND ($3::text IS NULL OR $3 = ANY(tags))
            ORDER BY name
            LIMIT $4 OFFSET $5
            "#,
            FAMILY_COLUMNS
        ))
        .bind(studio_id)
        .bind(&search)
        .bind(&tag)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows.into_iter().map(Into::into).collect(),
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    pub async fn get_family(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<Family> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            "SELECT {} FROM families WHERE id = $1 AND studio_id = $2",
            FAMILY_COLUMNS
        ))
        .bind(family_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Family".to_string()))?;

        Ok(row.into())
    }

    pub async fn get_family_detail(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<FamilyDetail> {
        let family = self.get_family(studio_id, family_id).await?;
        let students = self.list_students(studio_id, Some(family_id), true).await?;
        Ok(FamilyDetail { family, students })
    }

    pub async fn create_family(&self, studio_id: Uuid, input: CreateFamilyInput) -> AppResult<Family> {
        input.validate()?;
        let phone = Self::clean_phone(input.primary_phone.as_deref())?;

        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            r#"
            INSERT INTO families (studio_id, name, primary_email, primary_phone, address, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            FAMILY_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.name.trim())
        .bind(input.primary_email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(phone)
        .bind(&input.address)
        .bind(normalize_tags(&input.tags))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, family_id = %row.id, "Created family");
        Ok(row.into())
    }

    pub async fn update_family(
        &self,
        studio_id: Uuid,
        family_id: Uuid,
        input: UpdateFamilyInput,
    ) -> AppResult<Family> {
        input.validate()?;
        let phone = Self::clean_phone(input.primary_phone.as_deref())?;

        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            r#"
            UPDATE families SET
                name = COALESCE($3, name),
                primary_email = COALESCE($4, primary_email),
                primary_phone = COALESCE($5, primary_phone),
                address = COALESCE($6, address),
                tags = COALESCE($7, tags),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            FAMILY_COLUMNS
        ))
        .bind(family_id)
        .bind(studio_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.primary_email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(phone)
        .bind(&input.address)
        .bind(input.tags.as_deref().map(normalize_tags))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Family".to_string()))?;

        Ok(row.into())
    }

    /// Delete a family. Families with an unpaid balance are kept.
    pub async fn delete_family(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<()> {
        let unpaid = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM invoices
            WHERE family_id = $1 AND studio_id = $2 AND status IN ('open', 'partially_paid')
            "#,
        )
        .bind(family_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        if unpaid > 0 {
            return Err(AppError::Conflict {
                resource: "family".to_string(),
                message: "Family has unpaid invoices".to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM families WHERE id = $1 AND studio_id = $2")
            .bind(family_id)
            .bind(studio_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Family".to_string()));
        }
        Ok(())
    }

    /// Return the family's payment provider customer id, creating it if needed
    pub async fn ensure_billing_customer(
        &self,
        payments: &PaymentProviderClient,
        studio_id: Uuid,
        family_id: Uuid,
    ) -> AppResult<String> {
        let family = self.get_family(studio_id, family_id).await?;
        if let Some(customer_id) = family.billing_customer_id {
            return Ok(customer_id);
        }
        if !payments.is_configured() {
            return Err(AppError::Configuration("Payment provider is not configured".to_string()));
        }

        let customer = payments
            .create_customer(family.id, &family.name, family.primary_email.as_deref())
            .await?;

        sqlx::query(
            "UPDATE families SET billing_customer_id = $3, updated_at = NOW() WHERE id = $1 AND studio_id = $2",
        )
        .bind(family_id)
        .bind(studio_id)
        .bind(&customer.id)
        .execute(&self.db)
        .await?;

        tracing::info!(family_id = %family_id, customer_id = %customer.id, "Linked billing customer");
        Ok(customer.id)
    }

    // ========================================================================
    // Students
    // ========================================================================

    pub async fn list_students(
        &self,
        studio_id: Uuid,
        family_id: Option<Uuid>,
        include_inactive: bool,
    ) -> AppResult<Vec<StudentView>> {
        let rows = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            SELECT {} FROM students
            WHERE studio_id = $1
              AND ($2::uuid IS NULL OR family_id = $2)
              AND (is_active OR $3)
            ORDER BY last_name, first_name
            "#,
            STUDENT_COLUMNS
        ))
        .bind(studio_id)
        .bind(family_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        Ok(rows
            .into_iter()
            .map(|r| StudentView::new(r.into(), today))
            .collect())
    }

    pub async fn get_student(&self, studio_id: Uuid, student_id: Uuid) -> AppResult<StudentView> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE id = $1 AND studio_id = $2",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student".to_string()))?;

        Ok(StudentView::new(row.into(), Utc::now().date_naive()))
    }

    pub async fn create_student(
        &self,
        studio_id: Uuid,
        family_id: Uuid,
        input: CreateStudentInput,
    ) -> AppResult<StudentView> {
        input.validate()?;
        if input.date_of_birth.is_some_and(|dob| dob > Utc::now().date_naive()) {
            return Err(AppError::validation("date_of_birth", "Date of birth cannot be in the future"));
        }
        // Family must belong to this studio
        self.get_family(studio_id, family_id).await?;

        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            INSERT INTO students (studio_id, family_id, first_name, last_name, date_of_birth, medical_notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            STUDENT_COLUMNS
        ))
        .bind(studio_id)
        .bind(family_id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.date_of_birth)
        .bind(&input.medical_notes)
        .fetch_one(&self.db)
        .await?;

        Ok(StudentView::new(row.into(), Utc::now().date_naive()))
    }

    pub async fn update_student(
        &self,
        studio_id: Uuid,
        student_id: Uuid,
        input: UpdateStudentInput,
    ) -> AppResult<StudentView> {
        input.validate()?;

        if input.is_active == Some(false) {
            self.ensure_no_active_enrollments(studio_id, student_id).await?;
        }

        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            UPDATE students SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                date_of_birth = COALESCE($5, date_of_birth),
                medical_notes = COALESCE($6, medical_notes),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .bind(studio_id)
        .bind(input.first_name.as_deref().map(str::trim))
        .bind(input.last_name.as_deref().map(str::trim))
        .bind(input.date_of_birth)
        .bind(&input.medical_notes)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student".to_string()))?;

        Ok(StudentView::new(row.into(), Utc::now().date_naive()))
    }

    pub async fn deactivate_student(&self, studio_id: Uuid, student_id: Uuid) -> AppResult<()> {
        self.ensure_no_active_enrollments(studio_id, student_id).await?;

        let result = sqlx::query(
            "UPDATE students SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND studio_id = $2",
        )
        .bind(student_id)
        .bind(studio_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Student".to_string()));
        }
        Ok(())
    }

    /// Whether the student belongs to the family
    pub async fn student_in_family(&self, studio_id: Uuid, student_id: Uuid, family_id: Uuid) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM students WHERE id = $1 AND studio_id = $2 AND family_id = $3)",
        )
        .bind(student_id)
        .bind(studio_id)
        .bind(family_id)
        .fetch_one(&self.db)
        .await?;
        Ok(found)
    }

    async fn ensure_no_active_enrollments(&self, studio_id: Uuid, student_id: Uuid) -> AppResult<()> {
        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE student_id = $1 AND studio_id = $2 AND status IN ('active', 'pending', 'waitlisted')",
        )
        .bind(student_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        if active > 0 {
            return Err(AppError::Conflict {
                resource: "student".to_string(),
                message: "Student still has open enrollments".to_string(),
            });
        }
        Ok(())
    }

    fn clean_phone(phone: Option<&str>) -> AppResult<Option<String>> {
        match phone.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(None),
            Some(p) => {
                validate_phone(p).map_err(|m| AppError::validation("primary_phone", m))?;
                Ok(normalize_phone(p).or_else(|| Some(p.to_string())))
            }
        }
    }
}
