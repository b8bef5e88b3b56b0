//! Media library metadata. Files live in external storage; only URLs are kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{media_type_for, MediaType, MediaVisibility, UserRole};

#[derive(Clone)]
pub struct MediaService {
    db: PgPool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MediaItem {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub title: String,
    pub url: String,
    pub media_type: String,
    pub visibility: String,
    pub class_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMediaInput {
    #[validate(length(min = 1, max = 300, message = "Title is required"))]
    pub title: String,
    #[validate(url(message = "Invalid media URL"))]
    pub url: String,
    /// Inferred from the URL extension when omitted
    pub media_type: Option<MediaType>,
    #[serde(default = "default_visibility")]
    pub visibility: MediaVisibility,
    pub class_id: Option<Uuid>,
}

fn default_visibility() -> MediaVisibility {
    MediaVisibility::Parents
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaFilter {
    pub class_id: Option<Uuid>,
    pub media_type: Option<MediaType>,
}

/// Visibility values a role may see
fn visible_for(role: Option<UserRole>) -> &'static [&'static str] {
    match role {
        None => &["public"],
        Some(UserRole::Parent) => &["public", "parents"],
        Some(_) => &["public", "parents", "staff"],
    }
}

const MEDIA_COLUMNS: &str =
    "id, studio_id, title, url, media_type, visibility, class_id, uploaded_by, created_at";

impl MediaService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Media visible to a role; `None` lists public items only
    pub async fn list(
        &self,
        studio_id: Uuid,
        role: Option<UserRole>,
        filter: &MediaFilter,
    ) -> AppResult<Vec<MediaItem>> {
        let visibility: Vec<&str> = visible_for(role).to_vec();
        let items = sqlx::query_as::<_, MediaItem>(&format!(
            r#"
            SELECT {} FROM media_items
            WHERE studio_id = $1
              AND visibility = ANY($2)
              AND ($3::uuid IS NULL OR class_id = $3)
              AND ($4::text IS NULL OR media_type = $4)
            ORDER BY created_at DESC
            "#,
            MEDIA_COLUMNS
        ))
        .bind(studio_id)
        .bind(&visibility)
        .bind(filter.class_id)
        .bind(filter.media_type.map(|t| t.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    pub async fn create(&self, studio_id: Uuid, uploaded_by: Uuid, input: CreateMediaInput) -> AppResult<MediaItem> {
        input.validate()?;
        let media_type = input
            .media_type
            .or_else(|| media_type_for(&input.url))
            .ok_or_else(|| AppError::validation("media_type", "Could not determine media type from URL"))?;

        if let Some(class_id) = input.class_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM classes WHERE id = $1 AND studio_id = $2)",
            )
            .bind(class_id)
            .bind(studio_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Class".to_string()));
            }
        }

        let item = sqlx::query_as::<_, MediaItem>(&format!(
            r#"
            INSERT INTO media_items (studio_id, title, url, media_type, visibility, class_id, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.title.trim())
        .bind(&input.url)
        .bind(media_type.as_str())
        .bind(input.visibility.as_str())
        .bind(input.class_id)
        .bind(uploaded_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, media_id = %item.id, media_type = media_type.as_str(), "Media added");
        Ok(item)
    }

    pub async fn delete(&self, studio_id: Uuid, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM media_items WHERE id = $1 AND studio_id = $2")
            .bind(id)
            .bind(studio_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Media item".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_by_role() {
        assert_eq!(visible_for(None), &["public"]);
        assert!(!visible_for(Some(UserRole::Parent)).contains(&"staff"));
        assert!(visible_for(Some(UserRole::Instructor)).contains(&"staff"));
    }

    #[test]
    fn test_create_input_validation() {
        let input: CreateMediaInput =
            serde_json::from_str(r#"{"title":"Spring recital","url":"not a url"}"#).unwrap();
        assert!(input.validate().is_err());
        assert_eq!(input.visibility, MediaVisibility::Parents);
    }
}
