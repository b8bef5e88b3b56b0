//! Studio settings and user account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Resource, Studio};
use crate::services::auth::{InviteUserInput, UserSummary};
use crate::services::studio::UpdateStudioInput;
use crate::services::{AuthService, StudioService};
use crate::AppState;

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn get_studio(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Studio>> {
    check_permission(&user, Resource::Studio, Action::View)?;
    let service = StudioService::new(state.db.clone());
    Ok(Json(service.get_studio(user.studio_id).await?))
}

pub async fn update_studio(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateStudioInput>,
) -> AppResult<Json<Studio>> {
    check_permission(&user, Resource::Studio, Action::Edit)?;
    let service = StudioService::new(state.db.clone());
    Ok(Json(service.update_studio(user.studio_id, input).await?))
}

/// List user accounts of the studio
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    check_permission(&user, Resource::Staff, Action::View)?;
    let service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(service.list_users(user.studio_id).await?))
}

/// Create a login for an admin, instructor or parent
pub async fn invite_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<InviteUserInput>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    check_permission(&user, Resource::Staff, Action::Create)?;
    let service = AuthService::new(state.db.clone(), &state.config);
    let created = service.invite_user(user.studio_id, user.role, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn set_user_active(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> AppResult<Json<UserSummary>> {
    check_permission(&user, Resource::Staff, Action::Edit)?;
    let service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(service.set_user_active(user.studio_id, user_id, body.is_active).await?))
}
