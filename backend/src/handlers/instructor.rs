//! Instructor portal handlers
//!
//! Every class-scoped route checks that the caller teaches the class.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{check_permission, require_role, AuthUser, CurrentUser};
use crate::models::{Action, Resource, UserRole};
use crate::services::announcement::Announcement;
use crate::services::attendance::{AttendanceRange, AttendanceRecord, MarkAttendanceInput, SessionSheet, SessionSummary};
use crate::services::class::ClassOverview;
use crate::services::enrollment::ClassRoster;
use crate::services::media::{MediaFilter, MediaItem};
use crate::services::{AnnouncementService, AttendanceService, ClassService, EnrollmentService, MediaService};
use crate::AppState;

/// Resolve the caller's staff record and confirm they teach `class_id`
async fn own_class(state: &AppState, user: &AuthUser, class_id: Uuid) -> AppResult<Uuid> {
    require_role(user, &[UserRole::Instructor])?;
    let staff_id = user.staff()?;
    let teaches = ClassService::new(state.db.clone())
        .is_instructor_of(user.studio_id, class_id, staff_id)
        .await?;
    if !teaches {
        return Err(AppError::NotFound("Class".to_string()));
    }
    Ok(staff_id)
}

pub async fn my_classes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ClassOverview>>> {
    require_role(&user, &[UserRole::Instructor])?;
    let staff_id = user.staff()?;
    let service = ClassService::new(state.db.clone());
    Ok(Json(service.classes_for_instructor(user.studio_id, staff_id).await?))
}

pub async fn class_roster(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
) -> AppResult<Json<ClassRoster>> {
    check_permission(&user, Resource::Student, Action::View)?;
    own_class(&state, &user, class_id).await?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.class_roster(user.studio_id, class_id).await?))
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
    Json(input): Json<MarkAttendanceInput>,
) -> AppResult<Json<Vec<AttendanceRecord>>> {
    check_permission(&user, Resource::Attendance, Action::Create)?;
    require_role(&user, &[UserRole::Instructor])?;
    let staff_id = user.staff()?;
    let service = AttendanceService::new(state.db.clone());
    let records = service
        .mark_attendance(user.studio_id, class_id, user.user_id, Some(staff_id), input)
        .await?;
    Ok(Json(records))
}

pub async fn session_sheet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((class_id, session_date)): Path<(Uuid, NaiveDate)>,
) -> AppResult<Json<SessionSheet>> {
    check_permission(&user, Resource::Attendance, Action::View)?;
    own_class(&state, &user, class_id).await?;
    let service = AttendanceService::new(state.db.clone());
    Ok(Json(service.session_sheet(user.studio_id, class_id, session_date).await?))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
    Query(range): Query<AttendanceRange>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    check_permission(&user, Resource::Attendance, Action::View)?;
    own_class(&state, &user, class_id).await?;
    let service = AttendanceService::new(state.db.clone());
    Ok(Json(service.list_sessions(user.studio_id, class_id, &range).await?))
}

pub async fn announcements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Announcement>>> {
    check_permission(&user, Resource::Announcement, Action::View)?;
    let service = AnnouncementService::new(state.db.clone());
    Ok(Json(service.list_visible(user.studio_id, user.role).await?))
}

pub async fn media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MediaFilter>,
) -> AppResult<Json<Vec<MediaItem>>> {
    check_permission(&user, Resource::Media, Action::View)?;
    let service = MediaService::new(state.db.clone());
    Ok(Json(service.list(user.studio_id, Some(user.role), &filter).await?))
}
