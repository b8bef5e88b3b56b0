//! Attendance HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Resource};
use crate::services::attendance::{
    AttendanceRange, AttendanceRecord, MarkAttendanceInput, SessionSheet, SessionSummary,
    StudentAttendanceSummary,
};
use crate::services::AttendanceService;
use crate::AppState;

pub async fn mark_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<Uuid>,
    Json(input): Json<MarkAttendanceInput>,
) -> AppResult<Json<Vec<AttendanceRecord>>> {
    check_permission(&user, Resource::Attendance, Action::Create)?;
    let service = AttendanceService::new(state.db.clone());
    let records = service
        .mark_attendance(user.studio_id, class_id, user.user_id, None, input)
        .await?;
    Ok(Json(records))
}

pub async fn session_sheet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((class_id, session_date)): Path<(Uuid, NaiveDate)>,
) -> AppResult<Json<SessionSheet>> {
    check_permission(&user, Resource::Attendance, Action::View)?;
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
    let service = AttendanceService::new(state.db.clone());
    Ok(Json(service.list_sessions(user.studio_id, class_id, &range).await?))
}

pub async fn student_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(student_id): Path<Uuid>,
    Query(range): Query<AttendanceRange>,
) -> AppResult<Json<StudentAttendanceSummary>> {
    check_permission(&user, Resource::Attendance, Action::View)?;
    let service = AttendanceService::new(state.db.clone());
    Ok(Json(service.student_summary(user.studio_id, student_id, &range).await?))
}
