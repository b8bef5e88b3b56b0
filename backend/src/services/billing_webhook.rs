//! Payment provider webhook reconciliation
//!
//! Events are authenticated, claimed once in `webhook_events`, then mapped
//! onto local invoice, payment and tuition plan rows. A failed event is
//! recorded as `error` and may be claimed again when the provider retries,
//! as may a claim stuck in `processing` past [`STALE_CLAIM_SECS`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::{AppError, AppResult};
use crate::external::{PaymentProviderClient, ProviderSubscription};
use crate::middleware::secrets_match;
use crate::models::{cents_to_amount, InvoiceStatus, PaymentMethod, TuitionPlanStatus};
use crate::services::invoice::{InvoiceService, LineItemInput, NewInvoice, NewPayment, DEFAULT_DUE_DAYS};

type HmacSha256 = Hmac<Sha256>;

/// A claim left in `processing` this long is treated as abandoned
pub const STALE_CLAIM_SECS: i64 = 600;

/// Billing webhook service
#[derive(Clone)]
pub struct BillingWebhookService {
    db: PgPool,
    provider: PaymentProviderClient,
}

/// Provider event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// How an event was handled
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Ignored,
    Duplicate,
}

impl WebhookOutcome {
    fn as_result(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "success",
            WebhookOutcome::Ignored | WebhookOutcome::Duplicate => "ignored",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub event_id: String,
    pub outcome: WebhookOutcome,
}

// ============================================================================
// Provider object shapes (only the fields used here)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    payment_intent: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProviderInvoice {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    amount_due: i64,
    #[serde(default)]
    amount_paid: i64,
    payment_intent: Option<String>,
    due_date: Option<i64>,
    created: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    #[serde(default)]
    amount_received: i64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    amount_refunded: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PlanLink {
    id: Uuid,
    studio_id: Uuid,
    family_id: Uuid,
    name: String,
}

// ============================================================================
// Authentication
// ============================================================================

/// Verify a `t=<unix>,v1=<hex>` signature header over `"<t>.<body>"`.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::WebhookSignatureInvalid)?;
    let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
    if signatures.is_empty() || now.abs_diff(timestamp) > tolerance {
        return Err(AppError::WebhookSignatureInvalid);
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(AppError::WebhookSignatureInvalid)
}

/// Build a signature header for a payload; used by relays and tests
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Accept a signed delivery, or a relayed one carrying the webhook secret as bearer token
pub fn authenticate(
    config: &BillingConfig,
    signature_header: Option<&str>,
    bearer: Option<&str>,
    payload: &[u8],
    now: i64,
) -> AppResult<()> {
    if config.webhook_secret.is_empty() {
        return Err(AppError::Configuration("Billing webhook secret is not configured".to_string()));
    }
    if let Some(header) = signature_header {
        return verify_signature(header, payload, &config.webhook_secret, config.signature_tolerance_secs, now);
    }
    match bearer {
        Some(token) if secrets_match(token, &config.webhook_secret) => Ok(()),
        _ => Err(AppError::WebhookSignatureInvalid),
    }
}

fn metadata_uuid(metadata: &HashMap<String, String>, key: &str) -> Option<Uuid> {
    metadata.get(key).and_then(|v| Uuid::parse_str(v).ok())
}

fn timestamp_date(ts: Option<i64>) -> Option<NaiveDate> {
    ts.and_then(|t| Utc.timestamp_opt(t, 0).single()).map(|d| d.date_naive())
}

fn timestamp_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| Utc.timestamp_opt(t, 0).single())
}

fn parse_object<T: for<'de> Deserialize<'de>>(event: &WebhookEvent) -> AppResult<T> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        AppError::ValidationError(format!("Malformed {} payload: {}", event.event_type, e))
    })
}

impl BillingWebhookService {
    pub fn new(db: PgPool, provider: PaymentProviderClient) -> Self {
        Self { db, provider }
    }

    /// Claim, process and record one event
    pub async fn handle_event(&self, event: WebhookEvent) -> AppResult<WebhookAck> {
        if !self.claim_event(&event).await? {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook event acknowledged");
            return Ok(WebhookAck {
                received: true,
                event_id: event.id,
                outcome: WebhookOutcome::Duplicate,
            });
        }

        match self.process_event(&event).await {
            Ok(outcome) => {
                self.record_result(&event.id, outcome.as_result(), None).await?;
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    outcome = outcome.as_result(),
                    "Webhook event handled"
                );
                Ok(WebhookAck {
                    received: true,
                    event_id: event.id,
                    outcome,
                })
            }
            Err(e) => {
                tracing::error!(event_id = %event.id, event_type = %event.event_type, error = %e, "Webhook event failed");
                if let Err(record_err) = self.record_result(&event.id, "error", Some(&e.to_string())).await {
                    tracing::error!(event_id = %event.id, error = %record_err, "Could not record webhook failure");
                }
                Err(e)
            }
        }
    }

    /// Insert the event row. A previously failed event, or one whose claim
    /// went stale without a recorded result, may be claimed again.
    async fn claim_event(&self, event: &WebhookEvent) -> AppResult<bool> {
        let stale_before = Utc::now() - Duration::seconds(STALE_CLAIM_SECS);
        let claimed = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO webhook_events (external_event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (external_event_id) DO UPDATE SET
                processing_result = 'processing',
                error_message = NULL,
                received_at = NOW()
            WHERE webhook_events.processing_result = 'error'
               OR (webhook_events.processing_result = 'processing' AND webhook_events.received_at < $3)
            RETURNING id
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_type)
        .bind(stale_before)
        .fetch_optional(&self.db)
        .await?;
        Ok(claimed.is_some())
    }

    async fn record_result(&self, event_id: &str, result: &str, error: Option<&str>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET processing_result = $2, error_message = $3, processed_at = NOW()
            WHERE external_event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(result)
        .bind(error)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn process_event(&self, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
        match event.event_type.as_str() {
            "checkout.session.completed" => self.on_checkout_completed(parse_object(event)?).await,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.on_subscription_changed(parse_object(event)?).await
            }
            "customer.subscription.deleted" => self.on_subscription_deleted(parse_object(event)?).await,
            "invoice.finalized" => self.on_invoice_finalized(parse_object(event)?).await,
            "invoice.paid" => self.on_invoice_paid(parse_object(event)?).await,
            "invoice.payment_failed" => self.on_invoice_payment_failed(parse_object(event)?).await,
            "payment_intent.succeeded" => self.on_payment_succeeded(parse_object(event)?).await,
            "charge.refunded" => self.on_charge_refunded(parse_object(event)?).await,
            other => {
                tracing::debug!(event_type = %other, "Unhandled webhook event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    async fn on_checkout_completed(&self, session: CheckoutSession) -> AppResult<WebhookOutcome> {
        let family_id = metadata_uuid(&session.metadata, "family_id");
        let plan_id = metadata_uuid(&session.metadata, "tuition_plan_id");
        let invoice_id = metadata_uuid(&session.metadata, "invoice_id");

        // Fetch the subscription before opening the transaction
        let subscription = match (&session.subscription, self.provider.is_configured()) {
            (Some(id), true) => Some(self.provider.retrieve_subscription(id).await?),
            _ => None,
        };

        let mut tx = self.db.begin().await?;
        let mut touched = false;

        if let (Some(family_id), Some(customer)) = (family_id, &session.customer) {
            let linked = sqlx::query(
                "UPDATE families SET billing_customer_id = $2, updated_at = NOW() WHERE id = $1 AND billing_customer_id IS DISTINCT FROM $2",
            )
            .bind(family_id)
            .bind(customer)
            .execute(&mut *tx)
            .await?;
            touched |= linked.rows_affected() > 0;
        }

        if let (Some(plan_id), Some(subscription_id)) = (plan_id, &session.subscription) {
            let linked = sqlx::query(
                r#"
                UPDATE tuition_plans SET external_subscription_id = $2, status = 'active', updated_at = NOW()
                WHERE id = $1 AND status <> 'cancelled'
                "#,
            )
            .bind(plan_id)
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;
            touched |= linked.rows_affected() > 0;
        }

        if let Some(subscription) = &subscription {
            touched |= Self::sync_subscription(&mut tx, subscription).await?;
        }

        // One-off invoice payments carry the local invoice id
        if let (Some(invoice_id), Some(true)) = (invoice_id, session.payment_status.as_deref().map(|s| s == "paid")) {
            let amount = cents_to_amount(session.amount_total.unwrap_or(0));
            let reference = session.payment_intent.as_deref().unwrap_or(&session.id);
            touched |= Self::settle_invoice(&mut tx, invoice_id, amount, reference).await?;
        }

        tx.commit().await?;
        Ok(if touched { WebhookOutcome::Processed } else { WebhookOutcome::Ignored })
    }

    async fn on_subscription_changed(&self, subscription: ProviderSubscription) -> AppResult<WebhookOutcome> {
        let mut tx = self.db.begin().await?;

        if let Some(plan_id) = subscription
            .metadata
            .get("tuition_plan_id")
            .and_then(|v| Uuid::parse_str(v).ok())
        {
            sqlx::query(
                r#"
                UPDATE tuition_plans SET external_subscription_id = $2, updated_at = NOW()
                WHERE id = $1 AND external_subscription_id IS NULL
                "#,
            )
            .bind(plan_id)
            .bind(&subscription.id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = Self::sync_subscription(&mut tx, &subscription).await?;
        tx.commit().await?;

        Ok(if updated { WebhookOutcome::Processed } else { WebhookOutcome::Ignored })
    }

    async fn on_subscription_deleted(&self, subscription: ProviderSubscription) -> AppResult<WebhookOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE tuition_plans SET status = 'cancelled', cancel_at_period_end = FALSE, updated_at = NOW()
            WHERE external_subscription_id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(&subscription.id)
        .execute(&self.db)
        .await?;

        Ok(if result.rows_affected() > 0 {
            WebhookOutcome::Processed
        } else {
            WebhookOutcome::Ignored
        })
    }

    async fn on_invoice_finalized(&self, invoice: ProviderInvoice) -> AppResult<WebhookOutcome> {
        let mut tx = self.db.begin().await?;
        let created = Self::ensure_local_invoice(&mut tx, &invoice).await?.is_some();
        tx.commit().await?;
        Ok(if created { WebhookOutcome::Processed } else { WebhookOutcome::Ignored })
    }

    async fn on_invoice_paid(&self, invoice: ProviderInvoice) -> AppResult<WebhookOutcome> {
        let mut tx = self.db.begin().await?;

        let Some(local_id) = Self::ensure_local_invoice(&mut tx, &invoice).await? else {
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        };

        let reference = invoice.payment_intent.as_deref().unwrap_or(&invoice.id);
        let settled = Self::settle_invoice(&mut tx, local_id, cents_to_amount(invoice.amount_paid), reference).await?;

        if let Some(subscription_id) = &invoice.subscription {
            sqlx::query(
                "UPDATE tuition_plans SET status = 'active', updated_at = NOW() WHERE external_subscription_id = $1 AND status = 'past_due'",
            )
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(if settled { WebhookOutcome::Processed } else { WebhookOutcome::Ignored })
    }

    async fn on_invoice_payment_failed(&self, invoice: ProviderInvoice) -> AppResult<WebhookOutcome> {
        let Some(subscription_id) = &invoice.subscription else {
            return Ok(WebhookOutcome::Ignored);
        };

        let result = sqlx::query(
            r#"
            UPDATE tuition_plans SET status = 'past_due', updated_at = NOW()
            WHERE external_subscription_id = $1 AND status IN ('active', 'incomplete')
            "#,
        )
        .bind(subscription_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(subscription_id = %subscription_id, invoice = %invoice.id, "Subscription payment failed");
            Ok(WebhookOutcome::Processed)
        } else {
            Ok(WebhookOutcome::Ignored)
        }
    }

    async fn on_payment_succeeded(&self, intent: PaymentIntent) -> AppResult<WebhookOutcome> {
        let Some(invoice_id) = metadata_uuid(&intent.metadata, "invoice_id") else {
            return Ok(WebhookOutcome::Ignored);
        };

        let mut tx = self.db.begin().await?;
        let settled =
            Self::settle_invoice(&mut tx, invoice_id, cents_to_amount(intent.amount_received), &intent.id).await?;
        tx.commit().await?;

        Ok(if settled { WebhookOutcome::Processed } else { WebhookOutcome::Ignored })
    }

    async fn on_charge_refunded(&self, charge: Charge) -> AppResult<WebhookOutcome> {
        let reference = charge.payment_intent.as_deref().unwrap_or(&charge.id);
        let mut tx = self.db.begin().await?;

        let payment = sqlx::query_as::<_, (Uuid, Option<Uuid>, Decimal, Decimal)>(
            "SELECT id, invoice_id, amount, refunded_amount FROM payments WHERE external_payment_id = $1 FOR UPDATE",
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((payment_id, invoice_id, amount, already_refunded)) = payment else {
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        };

        // `amount_refunded` is cumulative for the charge
        let refunded_total = cents_to_amount(charge.amount_refunded).min(amount);
        let delta = refunded_total - already_refunded;
        if delta <= Decimal::ZERO {
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        }

        let fully_refunded = refunded_total >= amount;
        sqlx::query(
            r#"
            UPDATE payments SET refunded_amount = $2,
                status = CASE WHEN $3 THEN 'refunded' ELSE status END
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .bind(refunded_total)
        .bind(fully_refunded)
        .execute(&mut *tx)
        .await?;

        if let Some(invoice_id) = invoice_id {
            let studio_id = sqlx::query_scalar::<_, Uuid>("SELECT studio_id FROM invoices WHERE id = $1")
                .bind(invoice_id)
                .fetch_one(&mut *tx)
                .await?;
            let invoice = InvoiceService::lock_invoice(&mut tx, studio_id, invoice_id).await?;
            let status = InvoiceService::reverse_payment_tx(&mut tx, &invoice, delta).await?;
            tracing::info!(invoice_id = %invoice_id, refunded = %delta, status = %status, "Refund applied to invoice");
        }

        tx.commit().await?;
        Ok(WebhookOutcome::Processed)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Copy provider subscription state onto the linked plan
    async fn sync_subscription(
        tx: &mut Transaction<'_, Postgres>,
        subscription: &ProviderSubscription,
    ) -> AppResult<bool> {
        let Some(status) = TuitionPlanStatus::from_provider(&subscription.status) else {
            tracing::warn!(subscription_id = %subscription.id, status = %subscription.status, "Unknown subscription status");
            return Ok(false);
        };

        let result = sqlx::query(
            r#"
            UPDATE tuition_plans SET
                status = $2,
                current_period_end = $3,
                cancel_at_period_end = $4,
                updated_at = NOW()
            WHERE external_subscription_id = $1
            "#,
        )
        .bind(&subscription.id)
        .bind(status.as_str())
        .bind(timestamp_datetime(subscription.current_period_end))
        .bind(subscription.cancel_at_period_end)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find or create the local mirror of a provider invoice.
    /// Returns `None` when the invoice cannot be tied to a plan or family.
    async fn ensure_local_invoice(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &ProviderInvoice,
    ) -> AppResult<Option<Uuid>> {
        if let Some(existing) = InvoiceService::lock_invoice_by_external_id(tx, &invoice.id).await? {
            return Ok(Some(existing.id));
        }

        let plan = match &invoice.subscription {
            Some(subscription_id) => {
                sqlx::query_as::<_, PlanLink>(
                    "SELECT id, studio_id, family_id, name FROM tuition_plans WHERE external_subscription_id = $1",
                )
                .bind(subscription_id)
                .fetch_optional(&mut **tx)
                .await?
            }
            None => None,
        };

        let (studio_id, family_id, plan_id, description) = match plan {
            Some(plan) => (plan.studio_id, plan.family_id, Some(plan.id), plan.name),
            None => {
                let Some(customer) = &invoice.customer else {
                    return Ok(None);
                };
                let family = sqlx::query_as::<_, (Uuid, Uuid)>(
                    "SELECT studio_id, id FROM families WHERE billing_customer_id = $1",
                )
                .bind(customer)
                .fetch_optional(&mut **tx)
                .await?;
                let Some((studio_id, family_id)) = family else {
                    tracing::warn!(invoice = %invoice.id, customer = %customer, "Provider invoice for unknown customer");
                    return Ok(None);
                };
                let description = invoice.description.clone().unwrap_or_else(|| "Tuition".to_string());
                (studio_id, family_id, None, description)
            }
        };

        let issue_date = timestamp_date(invoice.created).unwrap_or_else(|| Utc::now().date_naive());
        let due_date = timestamp_date(invoice.due_date)
            .filter(|d| *d >= issue_date)
            .unwrap_or(issue_date + Duration::days(DEFAULT_DUE_DAYS));

        let created = InvoiceService::insert_invoice(
            tx,
            studio_id,
            NewInvoice {
                family_id,
                tuition_plan_id: plan_id,
                issue_date,
                due_date,
                status: InvoiceStatus::Open,
                line_items: vec![LineItemInput {
                    description,
                    quantity: 1,
                    unit_price: cents_to_amount(invoice.amount_due),
                    student_id: None,
                    class_id: None,
                }],
                notes: None,
                external_invoice_id: Some(invoice.id.clone()),
            },
        )
        .await?;

        tracing::info!(
            invoice_id = %created.id,
            external_invoice_id = %invoice.id,
            invoice_number = %created.invoice_number,
            "Provider invoice mirrored locally"
        );
        Ok(Some(created.id))
    }

    /// Apply a provider payment to a local invoice once per payment reference.
    /// Returns false when the payment was already recorded or nothing is owed.
    async fn settle_invoice(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        amount: Decimal,
        reference: &str,
    ) -> AppResult<bool> {
        let seen = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM payments WHERE external_payment_id = $1)")
            .bind(reference)
            .fetch_one(&mut **tx)
            .await?;
        if seen {
            return Ok(false);
        }

        let Some(studio_id) = sqlx::query_scalar::<_, Uuid>("SELECT studio_id FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(&mut **tx)
            .await?
        else {
            tracing::warn!(invoice_id = %invoice_id, "Payment references unknown invoice");
            return Ok(false);
        };

        let invoice = InvoiceService::lock_invoice(tx, studio_id, invoice_id).await?;
        let status = invoice.status()?;
        let owed = invoice.total - invoice.amount_paid;
        if !status.accepts_payments() || owed <= Decimal::ZERO {
            return Ok(false);
        }

        // Never record more than the remaining balance
        let applied = amount.min(owed);
        if applied <= Decimal::ZERO {
            return Ok(false);
        }
        if applied < amount {
            tracing::warn!(invoice_id = %invoice_id, received = %amount, applied = %applied, "Provider payment exceeds balance");
        }

        InvoiceService::apply_payment_tx(
            tx,
            &invoice,
            NewPayment {
                amount: applied,
                method: PaymentMethod::Card,
                external_payment_id: Some(reference),
                notes: None,
                paid_at: Utc::now(),
            },
        )
        .await?;

        Ok(true)
    }
}
