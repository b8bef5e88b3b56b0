//! Parent portal handlers
//!
//! Every route is scoped to the family linked to the caller's login;
//! records of other families answer 404.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_role, AuthUser, CurrentUser};
use crate::models::{Enrollment, UserRole};
use crate::services::announcement::Announcement;
use crate::services::class::ClassOverview;
use crate::services::enrollment::{EnrollInput, EnrollmentFilter, EnrollmentView};
use crate::services::family::{CreateStudentInput, FamilyDetail, StudentView};
use crate::services::invoice::{FamilyBalance, InvoiceDetail, InvoiceFilter, InvoiceView, Payment};
use crate::services::media::{MediaFilter, MediaItem};
use crate::services::waiver::{FamilyWaiverStatus, SignWaiverInput, WaiverSignature};
use crate::services::{
    AnnouncementService, ClassService, EnrollmentService, FamilyService, InvoiceService, MediaService,
    WaiverService,
};
use crate::AppState;
use shared::types::{PaginatedResponse, Pagination};

fn own_family(user: &AuthUser) -> AppResult<Uuid> {
    require_role(user, &[UserRole::Parent])?;
    user.family()
}

async fn ensure_own_enrollment(state: &AppState, user: &AuthUser, enrollment_id: Uuid) -> AppResult<()> {
    let family_id = own_family(user)?;
    let owner = EnrollmentService::new(state.db.clone())
        .enrollment_family(user.studio_id, enrollment_id)
        .await?;
    if owner != family_id {
        return Err(AppError::NotFound("Enrollment".to_string()));
    }
    Ok(())
}

/// Client address as reported by the proxy in front of the API
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Family and students
// ============================================================================

pub async fn my_family(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FamilyDetail>> {
    let family_id = own_family(&user)?;
    let service = FamilyService::new(state.db.clone());
    Ok(Json(service.get_family_detail(user.studio_id, family_id).await?))
}

pub async fn add_student(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateStudentInput>,
) -> AppResult<(StatusCode, Json<StudentView>)> {
    let family_id = own_family(&user)?;
    let service = FamilyService::new(state.db.clone());
    let student = service.create_student(user.studio_id, family_id, input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn class_schedule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ClassOverview>>> {
    own_family(&user)?;
    let service = ClassService::new(state.db.clone());
    Ok(Json(service.public_schedule(user.studio_id).await?))
}

// ============================================================================
// Enrollments
// ============================================================================

pub async fn my_enrollments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<EnrollmentView>>> {
    let family_id = own_family(&user)?;
    let filter = EnrollmentFilter {
        family_id: Some(family_id),
        ..Default::default()
    };
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.list_enrollments(user.studio_id, &filter).await?))
}

/// Request a spot in a class; the studio approves it later
pub async fn request_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<EnrollInput>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    let family_id = own_family(&user)?;
    let in_family = FamilyService::new(state.db.clone())
        .student_in_family(user.studio_id, input.student_id, family_id)
        .await?;
    if !in_family {
        return Err(AppError::NotFound("Student".to_string()));
    }

    let service = EnrollmentService::new(state.db.clone());
    let enrollment = service.enroll(user.studio_id, input, true).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Withdraw a pending or waitlisted request
pub async fn cancel_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    ensure_own_enrollment(&state, &user, enrollment_id).await?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.cancel(user.studio_id, enrollment_id).await?))
}

/// Leave a class the student is active in
pub async fn drop_enrollment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    ensure_own_enrollment(&state, &user, enrollment_id).await?;
    let service = EnrollmentService::new(state.db.clone());
    Ok(Json(service.drop_enrollment(user.studio_id, enrollment_id).await?))
}

// ============================================================================
// Billing
// ============================================================================

pub async fn my_invoices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<InvoiceFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<InvoiceView>>> {
    let family_id = own_family(&user)?;
    let filter = InvoiceFilter {
        family_id: Some(family_id),
        ..filter
    };
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.list_invoices(user.studio_id, &filter, &pagination).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    let family_id = own_family(&user)?;
    let service = InvoiceService::new(state.db.clone());
    if service.invoice_family(user.studio_id, invoice_id).await? != family_id {
        return Err(AppError::NotFound("Invoice".to_string()));
    }
    Ok(Json(service.get_invoice_detail(user.studio_id, invoice_id).await?))
}

pub async fn my_balance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FamilyBalance>> {
    let family_id = own_family(&user)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.family_balance(user.studio_id, family_id).await?))
}

pub async fn my_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Payment>>> {
    let family_id = own_family(&user)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.list_family_payments(user.studio_id, family_id).await?))
}

// ============================================================================
// Waivers and content
// ============================================================================

pub async fn my_waivers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<FamilyWaiverStatus>>> {
    let family_id = own_family(&user)?;
    let service = WaiverService::new(state.db.clone());
    Ok(Json(service.family_status(user.studio_id, family_id).await?))
}

pub async fn sign_waiver(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(waiver_id): Path<Uuid>,
    headers: HeaderMap,
    Json(input): Json<SignWaiverInput>,
) -> AppResult<(StatusCode, Json<WaiverSignature>)> {
    let family_id = own_family(&user)?;
    let service = WaiverService::new(state.db.clone());
    let signature = service
        .sign_waiver(user.studio_id, waiver_id, family_id, user.user_id, client_ip(&headers), input)
        .await?;
    Ok((StatusCode::CREATED, Json(signature)))
}

pub async fn announcements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Announcement>>> {
    own_family(&user)?;
    let service = AnnouncementService::new(state.db.clone());
    Ok(Json(service.list_visible(user.studio_id, UserRole::Parent).await?))
}

pub async fn media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MediaFilter>,
) -> AppResult<Json<Vec<MediaItem>>> {
    own_family(&user)?;
    let service = MediaService::new(state.db.clone());
    Ok(Json(service.list(user.studio_id, Some(UserRole::Parent), &filter).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_missing() {
        assert!(client_ip(&HeaderMap::new()).is_none());
    }
}
