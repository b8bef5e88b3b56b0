//! Announcement, media and waiver HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Resource};
use crate::services::announcement::{Announcement, CreateAnnouncementInput, UpdateAnnouncementInput};
use crate::services::media::{CreateMediaInput, MediaFilter, MediaItem};
use crate::services::waiver::{CreateWaiverInput, UpdateWaiverInput, Waiver, WaiverSignature};
use crate::services::{AnnouncementService, MediaService, WaiverService};
use crate::AppState;

#[derive(Deserialize)]
pub struct WaiverQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// ============================================================================
// Announcements
// ============================================================================

pub async fn list_announcements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Announcement>>> {
    check_permission(&user, Resource::Announcement, Action::View)?;
    let service = AnnouncementService::new(state.db.clone());
    Ok(Json(service.list_all(user.studio_id).await?))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateAnnouncementInput>,
) -> AppResult<(StatusCode, Json<Announcement>)> {
    check_permission(&user, Resource::Announcement, Action::Create)?;
    let service = AnnouncementService::new(state.db.clone());
    let announcement = service.create(user.studio_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(announcement_id): Path<Uuid>,
    Json(input): Json<UpdateAnnouncementInput>,
) -> AppResult<Json<Announcement>> {
    check_permission(&user, Resource::Announcement, Action::Edit)?;
    let service = AnnouncementService::new(state.db.clone());
    Ok(Json(service.update(user.studio_id, announcement_id, input).await?))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(announcement_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Announcement, Action::Delete)?;
    let service = AnnouncementService::new(state.db.clone());
    service.delete(user.studio_id, announcement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Media
// ============================================================================

pub async fn list_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MediaFilter>,
) -> AppResult<Json<Vec<MediaItem>>> {
    check_permission(&user, Resource::Media, Action::View)?;
    let service = MediaService::new(state.db.clone());
    Ok(Json(service.list(user.studio_id, Some(user.role), &filter).await?))
}

pub async fn create_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateMediaInput>,
) -> AppResult<(StatusCode, Json<MediaItem>)> {
    check_permission(&user, Resource::Media, Action::Create)?;
    let service = MediaService::new(state.db.clone());
    let item = service.create(user.studio_id, user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(media_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Media, Action::Delete)?;
    let service = MediaService::new(state.db.clone());
    service.delete(user.studio_id, media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Waivers
// ============================================================================

pub async fn list_waivers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<WaiverQuery>,
) -> AppResult<Json<Vec<Waiver>>> {
    check_permission(&user, Resource::Waiver, Action::View)?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.list_waivers(user.studio_id, query.include_inactive).await?))
}

pub async fn get_waiver(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(waiver_id): Path<Uuid>,
) -> AppResult<Json<Waiver>> {
    check_permission(&user, Resource::Waiver, Action::View)?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.get_waiver(user.studio_id, waiver_id).await?))
}

pub async fn create_waiver(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateWaiverInput>,
) -> AppResult<(StatusCode, Json<Waiver>)> {
    check_permission(&user, Resource::Waiver, Action::Create)?;
    let service = WaiverService::new(state.db.clone());
    let waiver = service.create_waiver(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(waiver)))
}

/// Update a waiver; changing the text requires families to sign again
pub async fn update_waiver(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(waiver_id): Path<Uuid>,
    Json(input): Json<UpdateWaiverInput>,
) -> AppResult<Json<Waiver>> {
    check_permission(&user, Resource::Waiver, Action::Edit)?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.update_waiver(user.studio_id, waiver_id, input).await?))
}

pub async fn list_signatures(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(waiver_id): Path<Uuid>,
) -> AppResult<Json<Vec<WaiverSignature>>> {
    check_permission(&user, Resource::Waiver, Action::View)?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.list_signatures(user.studio_id, waiver_id).await?))
}
