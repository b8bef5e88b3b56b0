//! Family and student HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Family, Resource};
use crate::services::family::{
    CreateFamilyInput, CreateStudentInput, FamilyDetail, FamilyFilter, StudentView, UpdateFamilyInput,
    UpdateStudentInput,
};
use crate::services::invoice::FamilyBalance;
use crate::services::waiver::FamilyWaiverStatus;
use crate::services::{FamilyService, InvoiceService, WaiverService};
use crate::AppState;
use shared::types::{PaginatedResponse, Pagination};

#[derive(Deserialize)]
pub struct StudentQuery {
    pub family_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Serialize)]
pub struct BillingCustomerResponse {
    pub family_id: Uuid,
    pub billing_customer_id: String,
}

// ============================================================================
// Families
// ============================================================================

pub async fn list_families(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<FamilyFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Family>>> {
    check_permission(&user, Resource::Family, Action::View)?;
    let service = FamilyService::new(state.db.clone());
    let families = service.list_families(user.studio_id, &filter, &pagination).await?;
    Ok(Json(families))
}

pub async fn get_family(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<Json<FamilyDetail>> {
    check_permission(&user, Resource::Family, Action::View)?;
    let service = FamilyService::new(state.db.clone());
    Ok(Json(service.get_family_detail(user.studio_id, family_id).await?))
}

pub async fn create_family(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateFamilyInput>,
) -> AppResult<(StatusCode, Json<Family>)> {
    check_permission(&user, Resource::Family, Action::Create)?;
    let service = FamilyService::new(state.db.clone());
    let family = service.create_family(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(family)))
}

pub async fn update_family(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
    Json(input): Json<UpdateFamilyInput>,
) -> AppResult<Json<Family>> {
    check_permission(&user, Resource::Family, Action::Edit)?;
    let service = FamilyService::new(state.db.clone());
    Ok(Json(service.update_family(user.studio_id, family_id, input).await?))
}

pub async fn delete_family(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Family, Action::Delete)?;
    let service = FamilyService::new(state.db.clone());
    service.delete_family(user.studio_id, family_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn family_balance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<Json<FamilyBalance>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.family_balance(user.studio_id, family_id).await?))
}

pub async fn family_waivers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<Json<Vec<FamilyWaiverStatus>>> {
    check_permission(&user, Resource::Waiver, Action::View)?;
    FamilyService::new(state.db.clone()).get_family(user.studio_id, family_id).await?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.family_status(user.studio_id, family_id).await?))
}

/// Create (or return) the family's customer record at the payment provider
pub async fn link_billing_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<Json<BillingCustomerResponse>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = FamilyService::new(state.db.clone());
    let billing_customer_id = service
        .ensure_billing_customer(&state.payments, user.studio_id, family_id)
        .await?;
    Ok(Json(BillingCustomerResponse {
        family_id,
        billing_customer_id,
    }))
}

// ============================================================================
// Students
// ============================================================================

pub async fn list_students(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StudentQuery>,
) -> AppResult<Json<Vec<StudentView>>> {
    check_permission(&user, Resource::Student, Action::View)?;
    let service = FamilyService::new(state.db.clone());
    let students = service
        .list_students(user.studio_id, query.family_id, query.include_inactive)
        .await?;
    Ok(Json(students))
}

pub async fn get_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<StudentView>> {
    check_permission(&user, Resource::Student, Action::View)?;
    let service = FamilyService::new(state.db.clone());
    Ok(Json(service.get_student(user.studio_id, student_id).await?))
}

pub async fn create_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
    Json(input): Json<CreateStudentInput>,
) -> AppResult<(StatusCode, Json<StudentView>)> {
    check_permission(&user, Resource::Student, Action::Create)?;
    let service = FamilyService::new(state.db.clone());
    let student = service.create_student(user.studio_id, family_id, input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn update_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(student_id): Path<Uuid>,
    Json(input): Json<UpdateStudentInput>,
) -> AppResult<Json<StudentView>> {
    check_permission(&user, Resource::Student, Action::Edit)?;
    let service = FamilyService::new(state.db.clone());
    Ok(Json(service.update_student(user.studio_id, student_id, input).await?))
}

pub async fn deactivate_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(student_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, Resource::Student, Action::Delete)?;
    let service = FamilyService::new(state.db.clone());
    service.deactivate_student(user.studio_id, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
