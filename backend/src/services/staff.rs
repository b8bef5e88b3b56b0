//! Staff management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Staff service
#[derive(Clone)]
pub struct StaffService {
    db: PgPool,
}

/// A staff member (instructor, front desk, ...)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub title: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStaffInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub title: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

const STAFF_COLUMNS: &str =
    "id, studio_id, name, email, phone, title, bio, hourly_rate, is_active, created_at, updated_at";

impl StaffService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_staff(&self, studio_id: Uuid, include_inactive: bool) -> AppResult<Vec<StaffMember>> {
        let staff = sqlx::query_as::<_, StaffMember>(&format!(
            "SELECT {} FROM staff WHERE studio_id = $1 AND (is_active OR $2) ORDER BY name",
            STAFF_COLUMNS
        ))
        .bind(studio_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(staff)
    }

    pub async fn get_staff(&self, studio_id: Uuid, staff_id: Uuid) -> AppResult<StaffMember> {
        sqlx::query_as::<_, StaffMember>(&format!(
            "SELECT {} FROM staff WHERE id = $1 AND studio_id = $2",
            STAFF_COLUMNS
        ))
        .bind(staff_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Staff member".to_string()))
    }

    pub async fn create_staff(&self, studio_id: Uuid, input: CreateStaffInput) -> AppResult<StaffMember> {
        input.validate()?;
        Self::validate_contact(input.phone.as_deref(), input.hourly_rate)?;

        let staff = sqlx::query_as::<_, StaffMember>(&format!(
            r#"
            INSERT INTO staff (studio_id, name, email, phone, title, bio, hourly_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.title)
        .bind(&input.bio)
        .bind(input.hourly_rate)
        .fetch_one(&self.db)
        .await?;

        Ok(staff)
    }

    pub async fn update_staff(
        &self,
        studio_id: Uuid,
        staff_id: Uuid,
        input: UpdateStaffInput,
    ) -> AppResult<StaffMember> {
        input.validate()?;
        Self::validate_contact(input.phone.as_deref(), input.hourly_rate)?;

        sqlx::query_as::<_, StaffMember>(&format!(
            r#"
            UPDATE staff SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                title = COALESCE($6, title),
                bio = COALESCE($7, bio),
                hourly_rate = COALESCE($8, hourly_rate),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            STAFF_COLUMNS
        ))
        .bind(staff_id)
        .bind(studio_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.title)
        .bind(&input.bio)
        .bind(input.hourly_rate)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Staff member".to_string()))
    }

    /// Deactivate a staff member; classes keep their history
    pub async fn deactivate_staff(&self, studio_id: Uuid, staff_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE staff SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND studio_id = $2",
        )
        .bind(staff_id)
        .bind(studio_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Staff member".to_string()));
        }

        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE staff_id = $1")
            .bind(staff_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    fn validate_contact(phone: Option<&str>, hourly_rate: Option<Decimal>) -> AppResult<()> {
        if let Some(phone) = phone.filter(|p| !p.is_empty()) {
            shared::validation::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if let Some(rate) = hourly_rate {
            shared::validation::validate_price(rate).map_err(|m| AppError::validation("hourly_rate", m))?;
        }
        Ok(())
    }
}
