//! Studio profile service

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Studio, StudioRow, STUDIO_COLUMNS};

/// Studio service
#[derive(Clone)]
pub struct StudioService {
    db: PgPool,
}

/// Input for updating the studio profile
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudioInput {
    #[validate(length(min = 1, max = 200, message = "Studio name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub timezone: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,
}

impl StudioService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_studio(&self, studio_id: Uuid) -> AppResult<Studio> {
        let row = sqlx::query_as::<_, StudioRow>(&format!(
            "SELECT {} FROM studios WHERE id = $1",
            STUDIO_COLUMNS
        ))
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Studio".to_string()))?;

        Ok(row.into())
    }

    pub async fn update_studio(&self, studio_id: Uuid, input: UpdateStudioInput) -> AppResult<Studio> {
        input.validate()?;
        if let Some(phone) = input.phone.as_deref().filter(|p| !p.is_empty()) {
            shared::validation::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let row = sqlx::query_as::<_, StudioRow>(&format!(
            r#"
            UPDATE studios SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                timezone = COALESCE($6, timezone),
                currency = COALESCE(UPPER($7), currency),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STUDIO_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.timezone)
        .bind(&input.currency)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Studio".to_string()))?;

        Ok(row.into())
    }
}
