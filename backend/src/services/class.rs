//! Class schedule service

use chrono::NaiveDate;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_level, ClassRow, DanceClass, CLASS_COLUMNS};
use shared::validation::{validate_capacity, validate_date_range, validate_price, validate_time_range};

/// Class service
#[derive(Clone)]
pub struct ClassService {
    db: PgPool,
}

/// A class with its current enrollment numbers
#[derive(Debug, Serialize)]
pub struct ClassOverview {
    #[serde(flatten)]
    pub class: DanceClass,
    pub instructor_name: Option<String>,
    pub active_count: i64,
    pub waitlist_count: i64,
    pub pending_count: i64,
    /// None when the class has unlimited capacity
    pub spots_remaining: Option<i64>,
}

#[derive(Debug, FromRow)]
struct ClassOverviewRow {
    #[sqlx(flatten)]
    class: ClassRow,
    instructor_name: Option<String>,
    active_count: i64,
    waitlist_count: i64,
    pending_count: i64,
}

impl From<ClassOverviewRow> for ClassOverview {
    fn from(row: ClassOverviewRow) -> Self {
        let spots_remaining = row
            .class
            .capacity
            .map(|cap| (cap as i64 - row.active_count).max(0));
        Self {
            class: row.class.into(),
            instructor_name: row.instructor_name,
            active_count: row.active_count,
            waitlist_count: row.waitlist_count,
            pending_count: row.pending_count,
            spots_remaining,
        }
    }
}

/// Query filters for listing classes
#[derive(Debug, Default, Deserialize)]
pub struct ClassFilter {
    pub instructor_id: Option<Uuid>,
    pub day_of_week: Option<i16>,
    pub level: Option<String>,
    pub style: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassInput {
    #[validate(length(min = 1, max = 200, message = "Class name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    #[validate(length(max = 50))]
    pub style: Option<String>,
    pub instructor_id: Option<Uuid>,
    #[validate(range(min = 1, max = 7, message = "Day of week must be 1 (Monday) to 7 (Sunday)"))]
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub monthly_tuition: Decimal,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClassInput {
    #[validate(length(min = 1, max = 200, message = "Class name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    #[validate(length(max = 50))]
    pub style: Option<String>,
    pub instructor_id: Option<Uuid>,
    #[validate(range(min = 1, max = 7, message = "Day of week must be 1 (Monday) to 7 (Sunday)"))]
    pub day_of_week: Option<i16>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub room: Option<String>,
    pub capacity: Option<i32>,
    /// Remove the capacity limit
    #[serde(default)]
    pub unlimited_capacity: bool,
    pub monthly_tuition: Option<Decimal>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

const OVERVIEW_SELECT: &str = r#"
    SELECT c.id, c.studio_id, c.name, c.description, c.level, c.style, c.instructor_id,
           c.day_of_week, c.start_time, c.end_time, c.room, c.capacity, c.monthly_tuition,
           c.starts_on, c.ends_on, c.is_active, c.created_at, c.updated_at,
           s.name AS instructor_name,
           COUNT(e.id) FILTER (WHERE e.status = 'active') AS active_count,
           COUNT(e.id) FILTER (WHERE e.status = 'waitlisted') AS waitlist_count,
           COUNT(e.id) FILTER (WHERE e.status = 'pending') AS pending_count
    FROM classes c
    LEFT JOIN staff s ON s.id = c.instructor_id
    LEFT JOIN enrollments e ON e.class_id = c.id
"#;

const OVERVIEW_GROUP: &str = " GROUP BY c.id, s.name ";

impl ClassService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_classes(&self, studio_id: Uuid, filter: &ClassFilter) -> AppResult<Vec<ClassOverview>> {
        let rows = sqlx::query_as::<_, ClassOverviewRow>(&format!(
            r#"{}
            WHERE c.studio_id = $1
              AND ($2::uuid IS NULL OR c.instructor_id = $2)
              AND ($3::smallint IS NULL OR c.day_of_week = $3)
              AND ($4::text IS NULL OR LOWER(c.level) = $4)
              AND ($5::text IS NULL OR LOWER(c.style) = $5)
              AND (c.is_active OR $6)
            {}
            ORDER BY c.day_of_week, c.start_time, c.name
            "#,
            OVERVIEW_SELECT, OVERVIEW_GROUP
        ))
        .bind(studio_id)
        .bind(filter.instructor_id)
        .bind(filter.day_of_week)
        .bind(filter.level.as_deref().map(normalize_level))
        .bind(filter.style.as_deref().map(normalize_level))
        .bind(filter.include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active classes shown on the studio's public schedule
    pub async fn public_schedule(&self, studio_id: Uuid) -> AppResult<Vec<ClassOverview>> {
        self.list_classes(studio_id, &ClassFilter::default()).await
    }

    /// Classes taught by one instructor
    pub async fn classes_for_instructor(&self, studio_id: Uuid, staff_id: Uuid) -> AppResult<Vec<ClassOverview>> {
        let filter = ClassFilter {
            instructor_id: Some(staff_id),
            ..Default::default()
        };
        self.list_classes(studio_id, &filter).await
    }

    pub async fn get_class_overview(&self, studio_id: Uuid, class_id: Uuid) -> AppResult<ClassOverview> {
        let row = sqlx::query_as::<_, ClassOverviewRow>(&format!(
            "{} WHERE c.id = $1 AND c.studio_id = $2 {}",
            OVERVIEW_SELECT, OVERVIEW_GROUP
        ))
        .bind(class_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Class".to_string()))?;

        Ok(row.into())
    }

    pub async fn get_class(&self, studio_id: Uuid, class_id: Uuid) -> AppResult<DanceClass> {
        let row = sqlx::query_as::<_, ClassRow>(&format!(
            "SELECT {} FROM classes WHERE id = $1 AND studio_id = $2",
            CLASS_COLUMNS
        ))
        .bind(class_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Class".to_string()))?;

        Ok(row.into())
    }

    /// Whether the staff member teaches the class
    pub async fn is_instructor_of(&self, studio_id: Uuid, class_id: Uuid, staff_id: Uuid) -> AppResult<bool> {
        let teaches = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM classes WHERE id = $1 AND studio_id = $2 AND instructor_id = $3)",
        )
        .bind(class_id)
        .bind(studio_id)
        .bind(staff_id)
        .fetch_one(&self.db)
        .await?;
        Ok(teaches)
    }

    pub async fn create_class(&self, studio_id: Uuid, input: CreateClassInput) -> AppResult<DanceClass> {
        input.validate()?;
        validate_time_range(input.start_time, input.end_time)
            .map_err(|m| AppError::validation("end_time", m))?;
        validate_capacity(input.capacity).map_err(|m| AppError::validation("capacity", m))?;
        validate_price(input.monthly_tuition).map_err(|m| AppError::validation("monthly_tuition", m))?;
        validate_date_range(input.starts_on, input.ends_on).map_err(|m| AppError::validation("ends_on", m))?;
        if let Some(instructor_id) = input.instructor_id {
            self.ensure_instructor(studio_id, instructor_id).await?;
        }

        let row = sqlx::query_as::<_, ClassRow>(&format!(
            r#"
            INSERT INTO classes (studio_id, name, description, level, style, instructor_id,
                                 day_of_week, start_time, end_time, room, capacity,
                                 monthly_tuition, starts_on, ends_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            CLASS_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.level.as_deref().map(normalize_level))
        .bind(input.style.as_deref().map(normalize_level))
        .bind(input.instructor_id)
        .bind(input.day_of_week)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(&input.room)
        .bind(input.capacity)
        .bind(input.monthly_tuition)
        .bind(input.starts_on)
        .bind(input.ends_on)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, class_id = %row.id, "Created class");
        Ok(row.into())
    }

    pub async fn update_class(
        &self,
        studio_id: Uuid,
        class_id: Uuid,
        input: UpdateClassInput,
    ) -> AppResult<DanceClass> {
        input.validate()?;
        let current = self.get_class(studio_id, class_id).await?;

        let start = input.start_time.unwrap_or(current.start_time);
        let end = input.end_time.unwrap_or(current.end_time);
        validate_time_range(start, end).map_err(|m| AppError::validation("end_time", m))?;
        validate_capacity(input.capacity).map_err(|m| AppError::validation("capacity", m))?;
        if let Some(tuition) = input.monthly_tuition {
            validate_price(tuition).map_err(|m| AppError::validation("monthly_tuition", m))?;
        }
        validate_date_range(
            input.starts_on.or(current.starts_on),
            input.ends_on.or(current.ends_on),
        )
        .map_err(|m| AppError::validation("ends_on", m))?;
        if let Some(instructor_id) = input.instructor_id {
            self.ensure_instructor(studio_id, instructor_id).await?;
        }

        let capacity = if input.unlimited_capacity {
            None
        } else {
            input.capacity.or(current.capacity)
        };

        let row = sqlx::query_as::<_, ClassRow>(&format!(
            r#"
            UPDATE classes SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                level = COALESCE($5, level),
                style = COALESCE($6, style),
                instructor_id = COALESCE($7, instructor_id),
                day_of_week = COALESCE($8, day_of_week),
                start_time = $9,
                end_time = $10,
                room = COALESCE($11, room),
                capacity = $12,
                monthly_tuition = COALESCE($13, monthly_tuition),
                starts_on = COALESCE($14, starts_on),
                ends_on = COALESCE($15, ends_on),
                is_active = COALESCE($16, is_active),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            CLASS_COLUMNS
        ))
        .bind(class_id)
        .bind(studio_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.level.as_deref().map(normalize_level))
        .bind(input.style.as_deref().map(normalize_level))
        .bind(input.instructor_id)
        .bind(input.day_of_week)
        .bind(start)
        .bind(end)
        .bind(&input.room)
        .bind(capacity)
        .bind(input.monthly_tuition)
        .bind(input.starts_on)
        .bind(input.ends_on)
        .bind(input.is_active)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Delete a class. Classes with active students must be emptied first.
    pub async fn delete_class(&self, studio_id: Uuid, class_id: Uuid) -> AppResult<()> {
        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE class_id = $1 AND studio_id = $2 AND status = 'active'",
        )
        .bind(class_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        if active > 0 {
            return Err(AppError::Conflict {
                resource: "class".to_string(),
                message: format!("Class has {} active enrollments; drop them before deleting", active),
            });
        }

        let result = sqlx::query("DELETE FROM classes WHERE id = $1 AND studio_id = $2")
            .bind(class_id)
            .bind(studio_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Class".to_string()));
        }

        tracing::info!(studio_id = %studio_id, class_id = %class_id, "Deleted class");
        Ok(())
    }

    async fn ensure_instructor(&self, studio_id: Uuid, staff_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM staff WHERE id = $1 AND studio_id = $2 AND is_active)",
        )
        .bind(staff_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::validation("instructor_id", "Instructor not found"))
        }
    }
}
