//! Studio announcements shown in the portals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{AnnouncementAudience, UserRole};

/// Announcement service
#[derive(Clone)]
pub struct AnnouncementService {
    db: PgPool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub title: String,
    pub body: String,
    pub audience: String,
    pub is_pinned: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementInput {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,
    #[serde(default = "default_audience")]
    pub audience: AnnouncementAudience,
    #[serde(default)]
    pub is_pinned: bool,
    /// Publish immediately when omitted and `draft` is false
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
}

fn default_audience() -> AnnouncementAudience {
    AnnouncementAudience::Everyone
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnnouncementInput {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: Option<String>,
    pub audience: Option<AnnouncementAudience>,
    pub is_pinned: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

const ANNOUNCEMENT_COLUMNS: &str = "id, studio_id, title, body, audience, is_pinned, published_at, \
     expires_at, created_by, created_at, updated_at";

fn check_window(published_at: Option<DateTime<Utc>>, expires_at: Option<DateTime<Utc>>) -> AppResult<()> {
    if let (Some(published), Some(expires)) = (published_at, expires_at) {
        if expires <= published {
            return Err(AppError::validation("expires_at", "Expiry must be after the publish time"));
        }
    }
    Ok(())
}

impl AnnouncementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Every announcement, including drafts and expired ones
    pub async fn list_all(&self, studio_id: Uuid) -> AppResult<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT {} FROM announcements WHERE studio_id = $1 ORDER BY is_pinned DESC, created_at DESC",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(studio_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Live announcements a role may see
    pub async fn list_visible(&self, studio_id: Uuid, role: UserRole) -> AppResult<Vec<Announcement>> {
        let audiences: Vec<&str> = AnnouncementAudience::visible_for(role).to_vec();
        let rows = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            SELECT {} FROM announcements
            WHERE studio_id = $1
              AND audience = ANY($2)
              AND published_at IS NOT NULL AND published_at <= NOW()
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY is_pinned DESC, published_at DESC
            "#,
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(studio_id)
        .bind(&audiences)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, studio_id: Uuid, id: Uuid) -> AppResult<Announcement> {
        sqlx::query_as::<_, Announcement>(&format!(
            "SELECT {} FROM announcements WHERE id = $1 AND studio_id = $2",
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Announcement".to_string()))
    }

    pub async fn create(
        &self,
        studio_id: Uuid,
        created_by: Uuid,
        input: CreateAnnouncementInput,
    ) -> AppResult<Announcement> {
        input.validate()?;
        let published_at = match (input.draft, input.published_at) {
            (true, _) => None,
            (false, Some(at)) => Some(at),
            (false, None) => Some(Utc::now()),
        };
        check_window(published_at, input.expires_at)?;

        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            INSERT INTO announcements (studio_id, title, body, audience, is_pinned, published_at, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.title.trim())
        .bind(&input.body)
        .bind(input.audience.as_str())
        .bind(input.is_pinned)
        .bind(published_at)
        .bind(input.expires_at)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, announcement_id = %announcement.id, "Announcement created");
        Ok(announcement)
    }

    pub async fn update(&self, studio_id: Uuid, id: Uuid, input: UpdateAnnouncementInput) -> AppResult<Announcement> {
        input.validate()?;
        let current = self.get(studio_id, id).await?;
        check_window(
            input.published_at.or(current.published_at),
            input.expires_at.or(current.expires_at),
        )?;

        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            UPDATE announcements SET
                title = COALESCE($3, title),
                body = COALESCE($4, body),
                audience = COALESCE($5, audience),
                is_pinned = COALESCE($6, is_pinned),
                published_at = COALESCE($7, published_at),
                expires_at = COALESCE($8, expires_at),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            ANNOUNCEMENT_COLUMNS
        ))
        .bind(id)
        .bind(studio_id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.body)
        .bind(input.audience.map(|a| a.as_str()))
        .bind(input.is_pinned)
        .bind(input.published_at)
        .bind(input.expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(announcement)
    }

    pub async fn delete(&self, studio_id: Uuid, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1 AND studio_id = $2")
            .bind(id)
            .bind(studio_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Announcement".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_check_window() {
        let now = Utc::now();
        assert!(check_window(Some(now), Some(now + Duration::days(1))).is_ok());
        assert!(check_window(Some(now), Some(now)).is_err());
        assert!(check_window(None, Some(now)).is_ok());
    }

    #[test]
    fn test_create_defaults() {
        let input: CreateAnnouncementInput =
            serde_json::from_str(r#"{"title":"Picture day","body":"Wear your recital costume"}"#).unwrap();
        assert_eq!(input.audience, AnnouncementAudience::Everyone);
        assert!(!input.is_pinned);
        assert!(!input.draft);
    }
}
