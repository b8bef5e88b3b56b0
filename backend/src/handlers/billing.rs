//! Invoice and tuition plan HTTP handlers (admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Resource};
use crate::services::invoice::{
    CreateInvoiceInput, InvoiceDetail, InvoiceFilter, InvoiceView, Payment, RecordPaymentInput,
};
use crate::services::tuition::{
    CreateTuitionPlanInput, TuitionPlan, TuitionPlanFilter, UpdateTuitionPlanInput,
};
use crate::services::{InvoiceService, TuitionService};
use crate::AppState;
use shared::types::{PaginatedResponse, Pagination};

// ============================================================================
// Invoices
// ============================================================================

pub async fn list_invoices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<InvoiceFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<InvoiceView>>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.list_invoices(user.studio_id, &filter, &pagination).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.get_invoice_detail(user.studio_id, invoice_id).await?))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<(StatusCode, Json<InvoiceDetail>)> {
    check_permission(&user, Resource::Billing, Action::Create)?;
    let service = InvoiceService::new(state.db.clone());
    let invoice = service.create_invoice(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Issue a draft invoice
pub async fn issue_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.issue_invoice(user.studio_id, invoice_id).await?))
}

pub async fn record_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<InvoiceDetail>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.record_payment(user.studio_id, invoice_id, input).await?))
}

pub async fn void_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceDetail>> {
    check_permission(&user, Resource::Billing, Action::Delete)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.void_invoice(user.studio_id, invoice_id).await?))
}

pub async fn family_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(family_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = InvoiceService::new(state.db.clone());
    Ok(Json(service.list_family_payments(user.studio_id, family_id).await?))
}

// ============================================================================
// Tuition plans
// ============================================================================

pub async fn list_plans(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<TuitionPlanFilter>,
) -> AppResult<Json<Vec<TuitionPlan>>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.list_plans(user.studio_id, &filter).await?))
}

pub async fn get_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<TuitionPlan>> {
    check_permission(&user, Resource::Billing, Action::View)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.get_plan(user.studio_id, plan_id).await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateTuitionPlanInput>,
) -> AppResult<(StatusCode, Json<TuitionPlan>)> {
    check_permission(&user, Resource::Billing, Action::Create)?;
    let service = TuitionService::new(state.db.clone());
    let plan = service.create_plan(user.studio_id, input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<UpdateTuitionPlanInput>,
) -> AppResult<Json<TuitionPlan>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.update_plan(user.studio_id, plan_id, input).await?))
}

pub async fn pause_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<TuitionPlan>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.pause_plan(user.studio_id, plan_id).await?))
}

pub async fn resume_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<TuitionPlan>> {
    check_permission(&user, Resource::Billing, Action::Edit)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.resume_plan(user.studio_id, plan_id).await?))
}

/// Cancel a plan and any provider subscription behind it
pub async fn cancel_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<TuitionPlan>> {
    check_permission(&user, Resource::Billing, Action::Delete)?;
    let service = TuitionService::new(state.db.clone());
    Ok(Json(service.cancel_plan(user.studio_id, plan_id, &state.payments).await?))
}
