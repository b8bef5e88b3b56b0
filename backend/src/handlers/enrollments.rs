//! Enrollment HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Enrollment, Resource};
use crate::services::enrollment::{EnrollInput, EnrollmentFilter, EnrollmentView};
use crate::services::EnrollmentService;
use crate::AppState;

pub async fn list_enrollments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<EnrollmentFilter>,
) -> AppResult<Json<Vec<EnrollmentView>>> {
    check_permission(&user, Resource::Enrollment, Action::View)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.list_enrollments(user.studio_id, &filter).await?))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::View)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.get_enrollment(user.studio_id, enrollment_id).await?))
}

/// Enroll a student; a full class puts them on the waitlist
pub async fn enroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<EnrollInput>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    check_permission(&user, Resource::Enrollment, Action::Create)?;
    let service = EnrollmentService::new(state.db.clone());
    let enrollment = service.enroll(user.studio_id, input, false).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn approve_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::Edit)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.approve(user.studio_id, enrollment_id).await?))
}

/// Move a waitlisted enrollment into the class
pub async fn promote_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::Edit)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.promote(user.studio_id, enrollment_id).await?))
}

/// Promote whoever is first on a class waitlist
pub async fn promote_next(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::Edit)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.promote_next(user.studio_id, class_id).await?))
}

pub async fn drop_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::Edit)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.drop_enrollment(user.studio_id, enrollment_id).await?))
}

pub async fn cancel_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    check_permission(&user, Resource::Enrollment, Action::Delete)?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.cancel(user.studio_id, enrollment_id).await?))
}
