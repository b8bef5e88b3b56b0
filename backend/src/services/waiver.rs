//! Waiver templates and family signatures
//!
//! Editing a waiver's text bumps its version; families must sign the
//! current version of every active required waiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{outstanding_waivers, WaiverRequirement};

#[derive(Clone)]
pub struct WaiverService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Waiver {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub title: String,
    pub body: String,
    pub version: i32,
    pub is_required: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct WaiverSignature {
    pub id: Uuid,
    pub waiver_id: Uuid,
    pub family_id: Uuid,
    pub waiver_version: i32,
    pub signed_by_name: String,
    pub signed_by_user: Option<Uuid>,
    pub ip_address: Option<String>,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWaiverInput {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Waiver text is required"))]
    pub body: String,
    #[serde(default = "default_required")]
    pub is_required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWaiverInput {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Waiver text is required"))]
    pub body: Option<String>,
    pub is_required: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignWaiverInput {
    #[validate(length(min = 2, max = 200, message = "Signer name is required"))]
    pub signed_by_name: String,
    /// Version shown to the signer; must match the current version
    pub version: i32,
}

/// Waiver status for one family
#[derive(Debug, Serialize)]
pub struct FamilyWaiverStatus {
    pub waiver: Waiver,
    pub signed_version: Option<i32>,
    pub outstanding: bool,
}

const WAIVER_COLUMNS: &str = "id, studio_id, title, body, version, is_required, is_active, created_at, updated_at";
const SIGNATURE_COLUMNS: &str =
    "id, waiver_id, family_id, waiver_version, signed_by_name, signed_by_user, ip_address, signed_at";

impl WaiverService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_waivers(&self, studio_id: Uuid, include_inactive: bool) -> AppResult<Vec<Waiver>> {
        let waivers = sqlx::query_as::<_, Waiver>(&format!(
            "SELECT {} FROM waivers WHERE studio_id = $1 AND ($2 OR is_active) ORDER BY title",
            WAIVER_COLUMNS
        ))
        .bind(studio_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(waivers)
    }

    pub async fn get_waiver(&self, studio_id: Uuid, waiver_id: Uuid) -> AppResult<Waiver> {
        sqlx::query_as::<_, Waiver>(&format!(
            "SELECT {} FROM waivers WHERE id = $1 AND studio_id = $2",
            WAIVER_COLUMNS
        ))
        .bind(waiver_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Waiver".to_string()))
    }

    pub async fn create_waiver(&self, studio_id: Uuid, input: CreateWaiverInput) -> AppResult<Waiver> {
        input.validate()?;
        let waiver = sqlx::query_as::<_, Waiver>(&format!(
            "INSERT INTO waivers (studio_id, title, body, is_required) VALUES ($1, $2, $3, $4) RETURNING {}",
            WAIVER_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.title.trim())
        .bind(&input.body)
        .bind(input.is_required)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, waiver_id = %waiver.id, "Waiver created");
        Ok(waiver)
    }

    /// Update a waiver; a change to the text starts a new version
    pub async fn update_waiver(&self, studio_id: Uuid, waiver_id: Uuid, input: UpdateWaiverInput) -> AppResult<Waiver> {
        input.validate()?;
        let current = self.get_waiver(studio_id, waiver_id).await?;
        let body_changed = input.body.as_deref().is_some_and(|b| b != current.body);

        let waiver = sqlx::query_as::<_, Waiver>(&format!(
            r#"
            UPDATE waivers SET
                title = COALESCE($3, title),
                body = COALESCE($4, body),
                is_required = COALESCE($5, is_required),
                is_active = COALESCE($6, is_active),
                version = version + CASE WHEN $7 THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            WAIVER_COLUMNS
        ))
        .bind(waiver_id)
        .bind(studio_id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.body)
        .bind(input.is_required)
        .bind(input.is_active)
        .bind(body_changed)
        .fetch_one(&self.db)
        .await?;

        if body_changed {
            tracing::info!(waiver_id = %waiver_id, version = waiver.version, "Waiver text revised");
        }
        Ok(waiver)
    }

    /// Sign the current version of a waiver for a family
    pub async fn sign_waiver(
        &self,
        studio_id: Uuid,
        waiver_id: Uuid,
        family_id: Uuid,
        signed_by_user: Uuid,
        ip_address: Option<String>,
        input: SignWaiverInput,
    ) -> AppResult<WaiverSignature> {
        input.validate()?;
        let waiver = self.get_waiver(studio_id, waiver_id).await?;
        if !waiver.is_active {
            return Err(AppError::validation("waiver_id", "Waiver is no longer active"));
        }
        if input.version != waiver.version {
            return Err(AppError::Conflict {
                resource: "waiver".to_string(),
                message: format!(
                    "Waiver was revised; please review version {} before signing",
                    waiver.version
                ),
            });
        }

        let signature = sqlx::query_as::<_, WaiverSignature>(&format!(
            r#"
            INSERT INTO waiver_signatures (waiver_id, family_id, waiver_version, signed_by_name, signed_by_user, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (waiver_id, family_id, waiver_version) DO NOTHING
            RETURNING {}
            "#,
            SIGNATURE_COLUMNS
        ))
        .bind(waiver_id)
        .bind(family_id)
        .bind(waiver.version)
        .bind(input.signed_by_name.trim())
        .bind(signed_by_user)
        .bind(ip_address)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Conflict {
            resource: "waiver_signature".to_string(),
            message: "This waiver version is already signed".to_string(),
        })?;

        tracing::info!(waiver_id = %waiver_id, family_id = %family_id, version = waiver.version, "Waiver signed");
        Ok(signature)
    }

    pub async fn list_signatures(&self, studio_id: Uuid, waiver_id: Uuid) -> AppResult<Vec<WaiverSignature>> {
        self.get_waiver(studio_id, waiver_id).await?;
        let signatures = sqlx::query_as::<_, WaiverSignature>(&format!(
            "SELECT {} FROM waiver_signatures WHERE waiver_id = $1 ORDER BY signed_at DESC",
            SIGNATURE_COLUMNS
        ))
        .bind(waiver_id)
        .fetch_all(&self.db)
        .await?;
        Ok(signatures)
    }

    /// Active waivers with the family's signing status
    pub async fn family_status(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<Vec<FamilyWaiverStatus>> {
        let waivers = self.list_waivers(studio_id, false).await?;
        let signed = sqlx::query_as::<_, (Uuid, i32)>(
            r#"
            SELECT s.waiver_id, s.waiver_version FROM waiver_signatures s
            JOIN waivers w ON w.id = s.waiver_id
            WHERE s.family_id = $1 AND w.studio_id = $2
            "#,
        )
        .bind(family_id)
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;

        let requirements: Vec<WaiverRequirement> = waivers
            .iter()
            .map(|w| WaiverRequirement {
                waiver_id: w.id,
                version: w.version,
                is_required: w.is_required,
            })
            .collect();
        let outstanding = outstanding_waivers(&requirements, &signed);

        Ok(waivers
            .into_iter()
            .map(|waiver| {
                let signed_version = signed
                    .iter()
                    .filter(|(id, _)| *id == waiver.id)
                    .map(|(_, v)| *v)
                    .max();
                FamilyWaiverStatus {
                    outstanding: outstanding.contains(&waiver.id),
                    signed_version,
                    waiver,
                }
            })
            .collect())
    }

    /// Ids of required waivers the family still has to sign
    pub async fn outstanding_for_family(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .family_status(studio_id, family_id)
            .await?
            .into_iter()
            .filter(|s| s.outstanding)
            .map(|s| s.waiver.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults_required() {
        let input: CreateWaiverInput =
            serde_json::from_str(r#"{"title":"Liability release","body":"I understand..."}"#).unwrap();
        assert!(input.is_required);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_sign_input_requires_name() {
        let input: SignWaiverInput = serde_json::from_str(r#"{"signed_by_name":"A","version":1}"#).unwrap();
        assert!(input.validate().is_err());
    }
}
