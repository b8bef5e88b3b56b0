//! Tuition plans and the recurring billing run

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::{Notification, Notifier, PaymentProviderClient};
use crate::models::{advance_anchored_billing_date, parse_status, BillingInterval, InvoiceStatus, TuitionPlanStatus};
use crate::services::invoice::{InvoiceService, LineItemInput, NewInvoice};
use shared::validation::validate_amount;

/// Tuition plan service
#[derive(Clone)]
pub struct TuitionService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TuitionPlan {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub billing_interval: String,
    pub status: String,
    pub next_billing_date: NaiveDate,
    /// Day of month that month-based intervals bill on
    pub billing_anchor_day: i16,
    pub due_days: i32,
    pub external_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TuitionPlan {
    pub fn status(&self) -> AppResult<TuitionPlanStatus> {
        parse_status(&self.status, TuitionPlanStatus::parse, "tuition plan")
    }

    pub fn interval(&self) -> AppResult<BillingInterval> {
        parse_status(&self.billing_interval, BillingInterval::parse, "billing interval")
    }

    /// Billed by the payment provider rather than the local run
    pub fn is_provider_managed(&self) -> bool {
        self.external_subscription_id.is_some()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTuitionPlanInput {
    pub family_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Plan name is required"))]
    pub name: String,
    pub amount: Decimal,
    pub billing_interval: BillingInterval,
    pub next_billing_date: NaiveDate,
    #[validate(range(min = 0, max = 90, message = "Due days must be between 0 and 90"))]
    pub due_days: Option<i32>,
    pub external_subscription_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTuitionPlanInput {
    #[validate(length(min = 1, max = 200, message = "Plan name is required"))]
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub billing_interval: Option<BillingInterval>,
    pub next_billing_date: Option<NaiveDate>,
    #[validate(range(min = 0, max = 90, message = "Due days must be between 0 and 90"))]
    pub due_days: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TuitionPlanFilter {
    pub family_id: Option<Uuid>,
    pub status: Option<TuitionPlanStatus>,
}

/// Outcome of one recurring billing run
#[derive(Debug, Default, Serialize)]
pub struct BillingRunSummary {
    pub run_date: Option<NaiveDate>,
    pub plans_due: usize,
    pub invoices_created: usize,
    pub failed: usize,
    pub invoice_ids: Vec<Uuid>,
}

/// Family contact details used for billing notices
#[derive(Debug, FromRow)]
struct BillingContact {
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

const PLAN_COLUMNS: &str = "id, studio_id, family_id, name, amount, billing_interval, status, \
     next_billing_date, billing_anchor_day, due_days, external_subscription_id, current_period_end, \
     cancel_at_period_end, created_at, updated_at";

impl TuitionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_plans(&self, studio_id: Uuid, filter: &TuitionPlanFilter) -> AppResult<Vec<TuitionPlan>> {
        let plans = sqlx::query_as::<_, TuitionPlan>(&format!(
            r#"
            SELECT {} FROM tuition_plans
            WHERE studio_id = $1
              AND ($2::uuid IS NULL OR family_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY next_billing_date, name
            "#,
            PLAN_COLUMNS
        ))
        .bind(studio_id)
        .bind(filter.family_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(plans)
    }

    pub async fn get_plan(&self, studio_id: Uuid, plan_id: Uuid) -> AppResult<TuitionPlan> {
        sqlx::query_as::<_, TuitionPlan>(&format!(
            "SELECT {} FROM tuition_plans WHERE id = $1 AND studio_id = $2",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tuition plan".to_string()))
    }

    pub async fn create_plan(&self, studio_id: Uuid, input: CreateTuitionPlanInput) -> AppResult<TuitionPlan> {
        input.validate()?;
        validate_amount(input.amount).map_err(|m| AppError::validation("amount", m))?;

        let family_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM families WHERE id = $1 AND studio_id = $2)",
        )
        .bind(input.family_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;
        if !family_exists {
            return Err(AppError::NotFound("Family".to_string()));
        }

        let plan = sqlx::query_as::<_, TuitionPlan>(&format!(
            r#"
            INSERT INTO tuition_plans (studio_id, family_id, name, amount, billing_interval,
                                       next_billing_date, billing_anchor_day, due_days, external_subscription_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(studio_id)
        .bind(input.family_id)
        .bind(input.name.trim())
        .bind(input.amount)
        .bind(input.billing_interval.as_str())
        .bind(input.next_billing_date)
        .bind(input.next_billing_date.day() as i16)
        .bind(input.due_days.unwrap_or(14))
        .bind(&input.external_subscription_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, plan_id = %plan.id, "Tuition plan created");
        Ok(plan)
    }

    pub async fn update_plan(
        &self,
        studio_id: Uuid,
        plan_id: Uuid,
        input: UpdateTuitionPlanInput,
    ) -> AppResult<TuitionPlan> {
        input.validate()?;
        if let Some(amount) = input.amount {
            validate_amount(amount).map_err(|m| AppError::validation("amount", m))?;
        }

        let current = self.get_plan(studio_id, plan_id).await?;
        if current.status()? == TuitionPlanStatus::Cancelled {
            return Err(AppError::InvalidStateTransition("Cancelled plans cannot be edited".to_string()));
        }

        let plan = sqlx::query_as::<_, TuitionPlan>(&format!(
            r#"
            UPDATE tuition_plans SET
                name = COALESCE($3, name),
                amount = COALESCE($4, amount),
                billing_interval = COALESCE($5, billing_interval),
                next_billing_date = COALESCE($6, next_billing_date),
                billing_anchor_day = COALESCE($8, billing_anchor_day),
                due_days = COALESCE($7, due_days),
                updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .bind(studio_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.amount)
        .bind(input.billing_interval.map(|i| i.as_str()))
        .bind(input.next_billing_date)
        .bind(input.due_days)
        .bind(input.next_billing_date.map(|d| d.day() as i16))
        .fetch_one(&self.db)
        .await?;

        Ok(plan)
    }

    pub async fn pause_plan(&self, studio_id: Uuid, plan_id: Uuid) -> AppResult<TuitionPlan> {
        self.set_status(studio_id, plan_id, TuitionPlanStatus::Active, TuitionPlanStatus::Paused)
            .await
    }

    /// Resume a paused plan; a billing date in the past is moved to today
    pub async fn resume_plan(&self, studio_id: Uuid, plan_id: Uuid) -> AppResult<TuitionPlan> {
        let plan = self
            .set_status(studio_id, plan_id, TuitionPlanStatus::Paused, TuitionPlanStatus::Active)
            .await?;

        let today = Utc::now().date_naive();
        if plan.next_billing_date >= today {
            return Ok(plan);
        }
        let plan = sqlx::query_as::<_, TuitionPlan>(&format!(
            "UPDATE tuition_plans SET next_billing_date = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .bind(today)
        .fetch_one(&self.db)
        .await?;
        Ok(plan)
    }

    /// Cancel a plan, cancelling the provider subscription first when linked
    pub async fn cancel_plan(
        &self,
        studio_id: Uuid,
        plan_id: Uuid,
        provider: &PaymentProviderClient,
    ) -> AppResult<TuitionPlan> {
        let plan = self.get_plan(studio_id, plan_id).await?;
        if plan.status()? == TuitionPlanStatus::Cancelled {
            return Err(AppError::InvalidStateTransition("Plan is already cancelled".to_string()));
        }

        if let Some(subscription_id) = &plan.external_subscription_id {
            provider.cancel_subscription(subscription_id).await?;
            tracing::info!(plan_id = %plan_id, subscription_id = %subscription_id, "Provider subscription cancelled");
        }

        let plan = sqlx::query_as::<_, TuitionPlan>(&format!(
            r#"
            UPDATE tuition_plans SET status = 'cancelled', cancel_at_period_end = FALSE, updated_at = NOW()
            WHERE id = $1 AND studio_id = $2
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .bind(studio_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(studio_id = %studio_id, plan_id = %plan_id, "Tuition plan cancelled");
        Ok(plan)
    }

    async fn set_status(
        &self,
        studio_id: Uuid,
        plan_id: Uuid,
        from: TuitionPlanStatus,
        to: TuitionPlanStatus,
    ) -> AppResult<TuitionPlan> {
        let updated = sqlx::query_as::<_, TuitionPlan>(&format!(
            r#"
            UPDATE tuition_plans SET status = $4, updated_at = NOW()
            WHERE id = $1 AND studio_id = $2 AND status = $3
            RETURNING {}
            "#,
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .bind(studio_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(plan) => Ok(plan),
            None => {
                let current = self.get_plan(studio_id, plan_id).await?;
                Err(AppError::InvalidStateTransition(format!(
                    "Cannot change plan from {} to {}",
                    current.status, to
                )))
            }
        }
    }

    // ========================================================================
    // Recurring billing
    // ========================================================================

    /// Invoice every active, locally billed plan due on or before `today`.
    ///
    /// Each plan is billed in its own transaction. A failing plan is logged
    /// and counted and the run moves on.
    pub async fn run_recurring_billing(
        &self,
        today: NaiveDate,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<BillingRunSummary> {
        let due_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM tuition_plans
            WHERE status = 'active'
              AND external_subscription_id IS NULL
              AND next_billing_date <= $1
            ORDER BY next_billing_date
            "#,
        )
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        let mut summary = BillingRunSummary {
            run_date: Some(today),
            plans_due: due_ids.len(),
            ..Default::default()
        };

        for plan_id in due_ids {
            match self.bill_plan(plan_id, today).await {
                Ok(Some((plan, invoice_id, invoice_number))) => {
                    summary.invoices_created += 1;
                    summary.invoice_ids.push(invoice_id);
                    self.notify_invoiced(&plan, invoice_id, &invoice_number, notifier.clone())
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(plan_id = %plan_id, error = %e, "Recurring billing failed for plan");
                }
            }
        }

        tracing::info!(
            run_date = %today,
            plans_due = summary.plans_due,
            invoices_created = summary.invoices_created,
            failed = summary.failed,
            "Recurring billing run finished"
        );

        Ok(summary)
    }

    /// Bill one plan. Returns `None` when the plan changed since it was selected.
    async fn bill_plan(
        &self,
        plan_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<Option<(TuitionPlan, Uuid, String)>> {
        let mut tx = self.db.begin().await?;

        let plan = sqlx::query_as::<_, TuitionPlan>(&format!(
            "SELECT {} FROM tuition_plans WHERE id = $1 FOR UPDATE SKIP LOCKED",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(plan) = plan else {
            return Ok(None);
        };
        if plan.status()? != TuitionPlanStatus::Active
            || plan.is_provider_managed()
            || plan.next_billing_date > today
        {
            return Ok(None);
        }

        let interval = plan.interval()?;
        let anchor_day = u32::try_from(plan.billing_anchor_day).unwrap_or(1);
        let period_end = advance_anchored_billing_date(plan.next_billing_date, interval, anchor_day);
        let invoice = InvoiceService::insert_invoice(
            &mut tx,
            plan.studio_id,
            NewInvoice {
                family_id: plan.family_id,
                tuition_plan_id: Some(plan.id),
                issue_date: today,
                due_date: today + Duration::days(i64::from(plan.due_days.max(0))),
                status: InvoiceStatus::Open,
                line_items: vec![LineItemInput {
                    description: billing_line_description(&plan.name, plan.next_billing_date, period_end),
                    quantity: 1,
                    unit_price: plan.amount,
                    student_id: None,
                    class_id: None,
                }],
                notes: None,
                external_invoice_id: None,
            },
        )
        .await?;

        sqlx::query("UPDATE tuition_plans SET next_billing_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(plan.id)
            .bind(period_end)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            plan_id = %plan.id,
            invoice_number = %invoice.invoice_number,
            next_billing_date = %period_end,
            "Plan billed"
        );

        Ok(Some((plan, invoice.id, invoice.invoice_number)))
    }

    /// Send the invoice notice in the background; failures are only logged
    async fn notify_invoiced(
        &self,
        plan: &TuitionPlan,
        invoice_id: Uuid,
        invoice_number: &str,
        notifier: Arc<dyn Notifier>,
    ) {
        let contact = match sqlx::query_as::<_, BillingContact>(
            "SELECT name, primary_email AS email, primary_phone AS phone FROM families WHERE id = $1",
        )
        .bind(plan.family_id)
        .fetch_optional(&self.db)
        .await
        {
            Ok(Some(contact)) => contact,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(family_id = %plan.family_id, error = %e, "Could not load billing contact");
                return;
            }
        };
        if contact.email.is_none() && contact.phone.is_none() {
            return;
        }

        let notification = Notification {
            studio_id: plan.studio_id,
            family_id: plan.family_id,
            channel: "email".to_string(),
            email: contact.email,
            phone: contact.phone,
            subject: format!("New invoice {}", invoice_number),
            body: format!(
                "Hi {}, invoice {} for {} ({}) is now available.",
                contact.name, invoice_number, plan.name, plan.amount
            ),
            kind: "invoice_created".to_string(),
            reference_id: Some(invoice_id),
        };

        tokio::spawn(async move {
            if let Err(e) = notifier.send(&notification).await {
                tracing::warn!(
                    family_id = %notification.family_id,
                    error = %e,
                    "Invoice notification failed"
                );
            }
        });
    }
}

fn billing_line_description(plan_name: &str, period_start: NaiveDate, period_end: NaiveDate) -> String {
    let last_day = period_end - Duration::days(1);
    format!(
        "{} ({} to {})",
        plan_name,
        period_start.format("%b %-d, %Y"),
        last_day.format("%b %-d, %Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::advance_billing_date;

    #[test]
    fn test_billing_line_description() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let end = advance_billing_date(start, BillingInterval::Monthly);
        assert_eq!(
            billing_line_description("Ballet monthly", start, end),
            "Ballet monthly (Sep 1, 2024 to Sep 30, 2024)"
        );
    }

    #[test]
    fn test_create_input_validation() {
        let input: CreateTuitionPlanInput = serde_json::from_str(
            r#"{"family_id":"00000000-0000-0000-0000-000000000000","name":"Hip hop",
                "amount":"85.00","billing_interval":"monthly","next_billing_date":"2024-10-01",
                "due_days":120}"#,
        )
        .unwrap();
        assert_eq!(input.billing_interval, BillingInterval::Monthly);
        assert!(input.validate().is_err());
    }
}
