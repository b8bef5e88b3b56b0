//! Class schedule HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, DanceClass, Resource};
use crate::services::class::{ClassFilter, ClassOverview, CreateClassInput, UpdateClassInput};
use crate::services::enrollment::ClassRoster;
use crate::services::{ClassService, EnrollmentService};
use crate::AppState;

pub async fn list_classes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<ClassFilter>,
) -> AppResult<Json<Vec<ClassOverview>>> {
    check_permission(&user, Resource::Class, Action::View)?;
    let service = ClassService::new(state.db.clone());
    Ok(Json(service.list_classes(user.studio_id, &filter).await?))
}

pub async fn get_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
) -> AppResult<Json<ClassOverview>> {
    check_permission(&user, Resource::Class, Action::View)?;
    let service = ClassService::new(state.db.clone());
    Ok(Json(service.get_class_overview(user.studio_id, class_id).await?))
}

pub async fn create_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateClassInput>,
) -> AppResult<(StatusCode, Json<DanceClass>)> {
    check_permission(&user, Resource::Class, Action::Create)?;
    let service = ClassService::new(state.db.clone());
    let class = service.create_class(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn update_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
    Json(input): Json<UpdateClassInput>,
) -> AppResult<Json<DanceClass>> {
    check_permission(&user, Resource::Class, Action::Edit)?;
    let service = ClassService::new(state.db.clone());
    Ok(Json(service.update_class(user.studio_id, class_id, input).await?))
}

/// Delete a class; refused while students are actively enrolled
pub async fn delete_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Class, Action::Delete)?;
    let service = ClassService::new(state.db.clone());
    service.delete_class(user.studio_id, class_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn class_roster(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
) -> AppResult<Json<ClassRoster>> {
    check_permission(&user, Resource::Enrollment, Action::View)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.class_roster(user.studio_id, class_id).await?))
}
