//! Staff management HTTP handlers

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
use crate::services::staff::{CreateStaffInput, StaffMember, UpdateStaffInput};
use crate::services::StaffService;
use crate::AppState;

#[derive(Deserialize)]
pub struct StaffQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_staff(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StaffQuery>,
) -> AppResult<Json<Vec<StaffMember>>> {
    check_permission(&user, Resource::Staff, Action::View)?;
    let service = StaffService::new(state.db.clone());
    Ok(Json(service.list_staff(user.studio_id, query.include_inactive).await?))
}

pub async fn get_staff(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(staff_id): Path<Uuid>,
) -> AppResult<Json<StaffMember>> {
    check_permission(&user, Resource::Staff, Action::View)?;
    let service = StaffService::new(state.db.clone());
    Ok(Json(service.get_staff(user.studio_id, staff_id).await?))
}

pub async fn create_staff(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateStaffInput>,
) -> AppResult<(StatusCode, Json<StaffMember>)> {
    check_permission(&user, Resource::Staff, Action::Create)?;
    let service = StaffService::new(state.db.clone());
    let staff = service.create_staff(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn update_staff(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(staff_id): Path<Uuid>,
    Json(input): Json<UpdateStaffInput>,
) -> AppResult<Json<StaffMember>> {
    check_permission(&user, Resource::Staff, Action::Edit)?;
    let service = StaffService::new(state.db.clone());
    Ok(Json(service.update_staff(user.studio_id, staff_id, input).await?))
}

/// Deactivate a staff member and their login
pub async fn deactivate_staff(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(staff_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Staff, Action::Delete)?;
    let service = StaffService::new(state.db.clone());
    service.deactivate_staff(user.studio_id, staff_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
