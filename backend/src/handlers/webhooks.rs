//! Machine endpoints: payment provider webhooks and cron triggers

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::middleware::secrets_match;
use crate::services::billing_webhook::{self, WebhookAck, WebhookEvent};
use crate::services::messaging::DispatchSummary;
use crate::services::tuition::BillingRunSummary;
use crate::services::{BillingWebhookService, MessagingService, TuitionService};
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Payment provider webhook
///
/// The raw body is needed for signature verification, so the event is
/// parsed only after authentication.
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    billing_webhook::authenticate(
        &state.config.billing,
        signature,
        bearer,
        &body,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected billing webhook");
        e
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid webhook payload: {}", e)))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Billing webhook received");

    let service = BillingWebhookService::new(state.db.clone(), state.payments.clone());
    let ack = service.handle_event(event).await?;
    Ok(Json(ack))
}

fn check_cron_secret(state: &AppState, auth: Option<TypedHeader<Authorization<Bearer>>>) -> AppResult<()> {
    let expected = state.config.cron.secret.as_str();
    if expected.is_empty() {
        return Err(AppError::Configuration("Cron secret is not configured".to_string()));
    }
    match auth {
        Some(TypedHeader(Authorization(bearer))) if secrets_match(bearer.token(), expected) => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid cron secret".to_string())),
    }
}

/// Deliver every scheduled message that is due
pub async fn dispatch_messages(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> AppResult<Json<DispatchSummary>> {
    check_cron_secret(&state, auth)?;
    let service = MessagingService::new(state.db.clone());
    let summary = service.dispatch_due_messages(Utc::now(), state.notifier.as_ref()).await?;
    Ok(Json(summary))
}

/// Invoice every tuition plan due today
pub async fn recurring_billing(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> AppResult<Json<BillingRunSummary>> {
    check_cron_secret(&state, auth)?;
    let service = TuitionService::new(state.db.clone());
    let summary = service
        .run_recurring_billing(Utc::now().date_naive(), state.notifier.clone())
        .await?;
    Ok(Json(summary))
}
