//! Reporting handlers for the dashboard and data export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::models::{Action, Resource};
use crate::services::reporting::{DashboardMetrics, ReportFilter, ReportingService};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub class_id: Option<Uuid>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportQuery {
    fn filter(&self) -> ReportFilter {
        ReportFilter {
            start_date: self.start_date.as_deref().and_then(|s| s.parse().ok()),
            end_date: self.end_date.as_deref().and_then(|s| s.parse().ok()),
            class_id: self.class_id,
        }
    }

    fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

fn respond<T: Serialize>(query: &ReportQuery, data: Vec<T>, filename: &str) -> AppResult<Response> {
    if query.wants_csv() {
        let csv = ReportingService::export_to_csv(&data)?;
        let disposition = format!("attachment; filename=\"{}.csv\"", filename);
        Ok((
            [(header::CONTENT_TYPE, "text/csv".to_string()), (header::CONTENT_DISPOSITION, disposition)],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(data).into_response())
    }
}

/// Get dashboard metrics
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    check_permission(&user, Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db.clone());
    let metrics = service.get_dashboard_metrics(user.studio_id).await?;
    Ok(Json(metrics))
}

/// Class roster, optionally limited to one class
pub async fn get_class_roster_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::View)?;
    if query.wants_csv() {
        check_permission(&user, Resource::Report, Action::Export)?;
    }
    let service = ReportingService::new(state.db.clone());
    let data = service.class_roster_export(user.studio_id, &query.filter()).await?;
    respond(&query, data, "class_roster")
}

pub async fn get_outstanding_invoices_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::View)?;
    if query.wants_csv() {
        check_permission(&user, Resource::Report, Action::Export)?;
    }
    let service = ReportingService::new(state.db.clone());
    let data = service.outstanding_invoices(user.studio_id).await?;
    respond(&query, data, "outstanding_invoices")
}

pub async fn get_class_utilization_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::View)?;
    if query.wants_csv() {
        check_permission(&user, Resource::Report, Action::Export)?;
    }
    let service = ReportingService::new(state.db.clone());
    let data = service.class_utilization(user.studio_id).await?;
    respond(&query, data, "class_utilization")
}

pub async fn get_revenue_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    check_permission(&user, Resource::Report, Action::View)?;
    if query.wants_csv() {
        check_permission(&user, Resource::Report, Action::Export)?;
    }
    let service = ReportingService::new(state.db.clone());
    let data = service.revenue_by_month(user.studio_id, &query.filter()).await?;
    respond(&query, data, "revenue")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_query_parses_dates() {
        let query = ReportQuery {
            start_date: Some("2024-09-01".into()),
            end_date: Some("not-a-date".into()),
            class_id: None,
            format: Some("csv".into()),
        };
        let filter = query.filter();
        assert_eq!(filter.start_date, chrono::NaiveDate::from_ymd_opt(2024, 9, 1));
        assert!(filter.end_date.is_none());
        assert!(query.wants_csv());
    }
}
