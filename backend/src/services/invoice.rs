//! Invoice and payment service
//!
//! Invoice numbers come from a per-studio counter on `studios.invoice_sequence`.
//! Payment application goes through `shared::models::apply_payment` so that
//! `amount_paid + balance_due == total` holds for every stored invoice.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    apply_payment, balance_due, format_invoice_number, invoice_total, is_overdue, parse_status,
    reverse_payment, InvoiceStatus, PaymentMethod, PaymentStatus,
};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_amount, validate_price};

/// Default days between issue and due date
pub const DEFAULT_DUE_DAYS: i64 = 14;

/// Invoice service
#[derive(Clone)]
pub struct InvoiceService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub family_id: Uuid,
    pub tuition_plan_id: Option<Uuid>,
    pub invoice_number: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub external_invoice_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> AppResult<InvoiceStatus> {
        parse_status(&self.status, InvoiceStatus::parse, "invoice")
    }
}

/// Invoice with derived balance fields
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub family_name: String,
    pub balance_due: Decimal,
    pub overdue: bool,
}

#[derive(Debug, FromRow)]
struct InvoiceWithFamily {
    #[sqlx(flatten)]
    invoice: Invoice,
    family_name: String,
}

impl InvoiceView {
    fn new(invoice: Invoice, family_name: String, today: NaiveDate) -> Self {
        let overdue = InvoiceStatus::parse(&invoice.status)
            .is_some_and(|s| is_overdue(s, invoice.due_date, today));
        Self {
            balance_due: balance_due(invoice.total, invoice.amount_paid),
            overdue,
            family_name,
            invoice,
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub student_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub family_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub status: String,
    pub external_payment_id: Option<String>,
    pub notes: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceView,
    pub line_items: Vec<InvoiceLineItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize)]
pub struct FamilyBalance {
    pub family_id: Uuid,
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub overdue_amount: Decimal,
    pub open_invoices: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    #[validate(length(min = 1, max = 500, message = "Line description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub unit_price: Decimal,
    pub student_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    pub family_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    #[validate]
    pub line_items: Vec<LineItemInput>,
    pub notes: Option<String>,
    /// Keep the invoice as a draft instead of issuing it
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub family_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub overdue: bool,
}

/// Everything needed to write a new invoice inside a transaction
#[derive(Debug)]
pub struct NewInvoice {
    pub family_id: Uuid,
    pub tuition_plan_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub line_items: Vec<LineItemInput>,
    pub notes: Option<String>,
    pub external_invoice_id: Option<String>,
}

/// A payment to apply inside a transaction
#[derive(Debug)]
pub struct NewPayment<'a> {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub external_payment_id: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub paid_at: DateTime<Utc>,
}

const INVOICE_COLUMNS: &str = "id, studio_id, family_id, tuition_plan_id, invoice_number, status, \
     issue_date, due_date, total, amount_paid, external_invoice_id, notes, created_at, updated_at";

const INVOICE_WITH_FAMILY: &str = r#"
    SELECT i.id, i.studio_id, i.family_id, i.tuition_plan_id, i.invoice_number, i.status,
           i.issue_date, i.due_date, i.total, i.amount_paid, i.external_invoice_id, i.notes,
           i.created_at, i.updated_at, f.name AS family_name
    FROM invoices i
    JOIN families f ON f.id = i.family_id
"#;

impl InvoiceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn list_invoices(
        &self,
        studio_id: Uuid,
        filter: &InvoiceFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<InvoiceView>> {
        let today = Utc::now().date_naive();
        let conditions = r#"
            WHERE i.studio_id = $1
              AND ($2::uuid IS NULL OR i.family_id = $2)
              AND ($3::text IS NULL OR i.status = $3)
              AND (NOT $4 OR (i.status IN ('open', 'partially_paid') AND i.due_date < $5))
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM invoices i {}",
            conditions
        ))
        .bind(studio_id)
        .bind(filter.family_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.overdue)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, InvoiceWithFamily>(&format!(
            "{} {} ORDER BY i.issue_date DESC, i.invoice_number DESC LIMIT $6 OFFSET $7",
            INVOICE_WITH_FAMILY, conditions
        ))
        .bind(studio_id)
        .bind(filter.family_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.overdue)
        .bind(today)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows
                .into_iter()
                .map(|r| InvoiceView::new(r.invoice, r.family_name, today))
                .collect(),
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    pub async fn get_invoice_detail(&self, studio_id: Uuid, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let row = sqlx::query_as::<_, InvoiceWithFamily>(&format!(
            "{} WHERE i.id = $1 AND i.studio_id = $2",
            INVOICE_WITH_FAMILY
        ))
        .bind(invoice_id)
        .bind(studio_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;

        let line_items = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT id, invoice_id, description, quantity, unit_price, amount, student_id, class_id
            FROM invoice_line_items WHERE invoice_id = $1 ORDER BY created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.db)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, family_id, invoice_id, amount, method, status, external_payment_id, notes, paid_at
            FROM payments WHERE invoice_id = $1 ORDER BY paid_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.db)
        .await?;

        Ok(InvoiceDetail {
            invoice: InvoiceView::new(row.invoice, row.family_name, Utc::now().date_naive()),
            line_items,
            payments,
        })
    }

    /// Family that owns an invoice, for portal ownership checks
    pub async fn invoice_family(&self, studio_id: Uuid, invoice_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT family_id FROM invoices WHERE id = $1 AND studio_id = $2")
            .bind(invoice_id)
            .bind(studio_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice".to_string()))
    }

    pub async fn family_balance(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<FamilyBalance> {
        let (total_invoiced, total_paid, overdue_amount, open_invoices) =
            sqlx::query_as::<_, (Decimal, Decimal, Decimal, i64)>(
                r#"
                SELECT COALESCE(SUM(total), 0),
                       COALESCE(SUM(amount_paid), 0),
                       COALESCE(SUM(total - amount_paid) FILTER (
                           WHERE status IN ('open', 'partially_paid') AND due_date < CURRENT_DATE), 0),
                       COUNT(*) FILTER (WHERE status IN ('open', 'partially_paid'))
                FROM invoices
                WHERE studio_id = $1 AND family_id = $2 AND status NOT IN ('void', 'draft')
                "#,
            )
            .bind(studio_id)
            .bind(family_id)
            .fetch_one(&self.db)
            .await?;

        Ok(FamilyBalance {
            family_id,
            total_invoiced,
            total_paid,
            balance_due: balance_due(total_invoiced, total_paid),
            overdue_amount,
            open_invoices,
        })
    }

    pub async fn list_family_payments(&self, studio_id: Uuid, family_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, family_id, invoice_id, amount, method, status, external_payment_id, notes, paid_at
            FROM payments WHERE studio_id = $1 AND family_id = $2
            ORDER BY paid_at DESC
            "#,
        )
        .bind(studio_id)
        .bind(family_id)
        .fetch_all(&self.db)
        .await?;
        Ok(payments)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn create_invoice(&self, studio_id: Uuid, input: CreateInvoiceInput) -> AppResult<InvoiceDetail> {
        input.validate()?;
        for line in &input.line_items {
            validate_price(line.unit_price).map_err(|m| AppError::validation("unit_price", m))?;
        }

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(DEFAULT_DUE_DAYS));
        if due_date < issue_date {
            return Err(AppError::validation("due_date", "Due date cannot be before the issue date"));
        }

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

        let mut tx = self.db.begin().await?;
        let invoice = Self::insert_invoice(
            &mut tx,
            studio_id,
            NewInvoice {
                family_id: input.family_id,
                tuition_plan_id: None,
                issue_date,
                due_date,
                status: if input.draft { InvoiceStatus::Draft } else { InvoiceStatus::Open },
                line_items: input.line_items,
                notes: input.notes,
                external_invoice_id: None,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            studio_id = %studio_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Invoice created"
        );

        self.get_invoice_detail(studio_id, invoice.id).await
    }

    /// Move a draft invoice to open
    pub async fn issue_invoice(&self, studio_id: Uuid, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let updated = sqlx::query(
            "UPDATE invoices SET status = 'open', updated_at = NOW() WHERE id = $1 AND studio_id = $2 AND status = 'draft'",
        )
        .bind(invoice_id)
        .bind(studio_id)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            let current = self.get_invoice_detail(studio_id, invoice_id).await?;
            return Err(AppError::InvalidStateTransition(format!(
                "Only draft invoices can be issued (current status: {})",
                current.invoice.invoice.status
            )));
        }
        self.get_invoice_detail(studio_id, invoice_id).await
    }

    /// Record a manual (cash, check, ...) payment against an invoice
    pub async fn record_payment(
        &self,
        studio_id: Uuid,
        invoice_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<InvoiceDetail> {
        validate_amount(input.amount).map_err(|m| AppError::validation("amount", m))?;

        let mut tx = self.db.begin().await?;
        let invoice = Self::lock_invoice(&mut tx, studio_id, invoice_id).await?;
        Self::apply_payment_tx(
            &mut tx,
            &invoice,
            NewPayment {
                amount: input.amount,
                method: input.method,
                external_payment_id: None,
                notes: input.notes.as_deref(),
                paid_at: input.paid_at.unwrap_or_else(Utc::now),
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            amount = %input.amount,
            method = input.method.as_str(),
            "Payment recorded"
        );

        self.get_invoice_detail(studio_id, invoice_id).await
    }

    /// Void an invoice that has not received any payment
    pub async fn void_invoice(&self, studio_id: Uuid, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut tx = self.db.begin().await?;
        let invoice = Self::lock_invoice(&mut tx, studio_id, invoice_id).await?;

        let status = invoice.status()?;
        if status == InvoiceStatus::Void {
            return Err(AppError::InvalidStateTransition("Invoice is already void".to_string()));
        }
        if invoice.amount_paid > Decimal::ZERO {
            return Err(AppError::InvalidStateTransition(
                "Invoices with payments cannot be voided; refund the payments first".to_string(),
            ));
        }

        sqlx::query("UPDATE invoices SET status = 'void', updated_at = NOW() WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice_id, "Invoice voided");
        self.get_invoice_detail(studio_id, invoice_id).await
    }

    // ========================================================================
    // Transaction helpers (shared with tuition billing and webhooks)
    // ========================================================================

    /// Allocate the next invoice number for a studio
    pub async fn next_invoice_number(
        tx: &mut Transaction<'_, Postgres>,
        studio_id: Uuid,
        issue_date: NaiveDate,
    ) -> AppResult<String> {
        let sequence = sqlx::query_scalar::<_, i64>(
            "UPDATE studios SET invoice_sequence = invoice_sequence + 1 WHERE id = $1 RETURNING invoice_sequence",
        )
        .bind(studio_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Studio".to_string()))?;

        Ok(format_invoice_number(issue_date.year(), sequence))
    }

    /// Insert an invoice with its line items
    pub async fn insert_invoice(
        tx: &mut Transaction<'_, Postgres>,
        studio_id: Uuid,
        new: NewInvoice,
    ) -> AppResult<Invoice> {
        let lines: Vec<(i32, Decimal)> = new.line_items.iter().map(|l| (l.quantity, l.unit_price)).collect();
        let total = invoice_total(&lines);
        let invoice_number = Self::next_invoice_number(tx, studio_id, new.issue_date).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (studio_id, family_id, tuition_plan_id, invoice_number, status,
                                  issue_date, due_date, total, external_invoice_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(studio_id)
        .bind(new.family_id)
        .bind(new.tuition_plan_id)
        .bind(&invoice_number)
        .bind(new.status.as_str())
        .bind(new.issue_date)
        .bind(new.due_date)
        .bind(total)
        .bind(&new.external_invoice_id)
        .bind(&new.notes)
        .fetch_one(&mut **tx)
        .await?;

        for line in &new.line_items {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (invoice_id, description, quantity, unit_price, amount, student_id, class_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(invoice.id)
            .bind(line.description.trim())
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind((Decimal::from(line.quantity) * line.unit_price).round_dp(2))
            .bind(line.student_id)
            .bind(line.class_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(invoice)
    }

    pub async fn lock_invoice(
        tx: &mut Transaction<'_, Postgres>,
        studio_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<Invoice> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1 AND studio_id = $2 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(studio_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice".to_string()))
    }

    /// Lock an invoice by its payment provider id
    pub async fn lock_invoice_by_external_id(
        tx: &mut Transaction<'_, Postgres>,
        external_invoice_id: &str,
    ) -> AppResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE external_invoice_id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(external_invoice_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(invoice)
    }

    /// Apply a payment to a locked invoice and store the payment row
    pub async fn apply_payment_tx(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &Invoice,
        payment: NewPayment<'_>,
    ) -> AppResult<Payment> {
        let (new_paid, new_status) =
            apply_payment(invoice.status()?, invoice.total, invoice.amount_paid, payment.amount)?;

        let stored = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (studio_id, family_id, invoice_id, amount, method, status,
                                  external_payment_id, notes, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, family_id, invoice_id, amount, method, status, external_payment_id, notes, paid_at
            "#,
        )
        .bind(invoice.studio_id)
        .bind(invoice.family_id)
        .bind(invoice.id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(payment.external_payment_id)
        .bind(payment.notes)
        .bind(payment.paid_at)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("UPDATE invoices SET amount_paid = $2, status = $3, updated_at = NOW() WHERE id = $1")
            .bind(invoice.id)
            .bind(new_paid)
            .bind(new_status.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(stored)
    }

    /// Reverse a refunded amount on a locked invoice
    pub async fn reverse_payment_tx(
        tx: &mut Transaction<'_, Postgres>,
        invoice: &Invoice,
        refunded: Decimal,
    ) -> AppResult<InvoiceStatus> {
        let (new_paid, new_status) =
            reverse_payment(invoice.status()?, invoice.total, invoice.amount_paid, refunded);

        sqlx::query("UPDATE invoices SET amount_paid = $2, status = $3, updated_at = NOW() WHERE id = $1")
            .bind(invoice.id)
            .bind(new_paid)
            .bind(new_status.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(new_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(status: &str, total: i64, paid: i64, due: NaiveDate) -> Invoice {
        Invoice {
            id: Uuid::nil(),
            studio_id: Uuid::nil(),
            family_id: Uuid::nil(),
            tuition_plan_id: None,
            invoice_number: "INV-2024-00001".into(),
            status: status.into(),
            issue_date: due - Duration::days(14),
            due_date: due,
            total: Decimal::from(total),
            amount_paid: Decimal::from(paid),
            external_invoice_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_input_validates_line_items() {
        let input: CreateInvoiceInput = serde_json::from_value(serde_json::json!({
            "family_id": Uuid::nil(),
            "line_items": []
        }))
        .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("line_items"));

        let input: CreateInvoiceInput = serde_json::from_value(serde_json::json!({
            "family_id": Uuid::nil(),
            "line_items": [{"description": "Ballet I - October", "quantity": 0, "unit_price": "85.00"}]
        }))
        .unwrap();
        assert!(input.validate().is_err());

        let input: CreateInvoiceInput = serde_json::from_value(serde_json::json!({
            "family_id": Uuid::nil(),
            "line_items": [{"description": "Ballet I - October", "unit_price": "85.00"}]
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.line_items[0].quantity, 1);
    }

    #[test]
    fn test_view_balance_and_overdue() {
        let due = NaiveDate::from_ymd_opt(2024, 9, 15).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();
        let view = InvoiceView::new(invoice("partially_paid", 120, 50, due), "Rivera".into(), today);
        assert_eq!(view.balance_due, Decimal::from(70));
        assert!(view.overdue);

        let paid = InvoiceView::new(invoice("paid", 120, 120, due), "Rivera".into(), today);
        assert_eq!(paid.balance_due, Decimal::ZERO);
        assert!(!paid.overdue);
    }

    #[test]
    fn test_create_input_defaults() {
        let input: CreateInvoiceInput = serde_json::from_str(
            r#"{"family_id":"00000000-0000-0000-0000-000000000000",
                "line_items":[{"description":"Costume fee","unit_price":"45.00"}]}"#,
        )
        .unwrap();
        assert_eq!(input.line_items[0].quantity, 1);
        assert!(!input.draft);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_create_input_requires_lines() {
        let input: CreateInvoiceInput = serde_json::from_str(
            r#"{"family_id":"00000000-0000-0000-0000-000000000000","line_items":[]}"#,
        )
        .unwrap();
        assert!(input.validate().is_err());
    }
}
