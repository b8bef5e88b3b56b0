//! Unauthenticated studio pages: profile, class schedule and public media

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentTenant;
use crate::models::StudioProfile;
use crate::services::class::ClassOverview;
use crate::services::media::{MediaFilter, MediaItem};
use crate::services::{ClassService, MediaService, StudioService};
use crate::AppState;

/// Public profile of the studio addressed by the host
pub async fn studio_profile(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> AppResult<Json<StudioProfile>> {
    let service = StudioService::new(state.db.clone());
    let studio = service.get_studio(tenant.studio_id).await?;
    Ok(Json(StudioProfile::from(studio)))
}

/// Weekly schedule of active classes with open spots
pub async fn class_schedule(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> AppResult<Json<Vec<ClassOverview>>> {
    let service = ClassService::new(state.db.clone());
    let classes = service.public_schedule(tenant.studio_id).await?;
    Ok(Json(classes))
}

pub async fn public_media(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> AppResult<Json<Vec<MediaItem>>> {
    let service = MediaService::new(state.db.clone());
    let items = service.list(tenant.studio_id, None, &MediaFilter::default()).await?;
    Ok(Json(items))
}
