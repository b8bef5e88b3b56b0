//! Billing webhook idempotency and settlement against a real database

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use dance_studio_backend::external::PaymentProviderClient;
use dance_studio_backend::services::billing_webhook::{
    BillingWebhookService, WebhookEvent, WebhookOutcome, STALE_CLAIM_SECS,
};

use common::*;

fn service(pool: &PgPool) -> BillingWebhookService {
    let provider = PaymentProviderClient::with_base_url(String::new(), "http://127.0.0.1:9".to_string());
    BillingWebhookService::new(pool.clone(), provider)
}

fn payment_event(event_id: &str, intent_id: &str, invoice_id: Uuid, cents: i64) -> WebhookEvent {
    serde_json::from_value(json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent_id,
            "amount_received": cents,
            "metadata": { "invoice_id": invoice_id.to_string() }
        }}
    }))
    .unwrap()
}

fn refund_event(event_id: &str, intent_id: &str, cumulative_cents: i64) -> WebhookEvent {
    serde_json::from_value(json!({
        "id": event_id,
        "type": "charge.refunded",
        "data": { "object": {
            "id": format!("ch_{intent_id}"),
            "payment_intent": intent_id,
            "amount_refunded": cumulative_cents
        }}
    }))
    .unwrap()
}

async fn event_result(pool: &PgPool, event_id: &str) -> String {
    sqlx::query_scalar("SELECT processing_result FROM webhook_events WHERE external_event_id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn invoice_state(pool: &PgPool, invoice_id: Uuid) -> (String, Decimal) {
    sqlx::query_as("SELECT status, amount_paid FROM invoices WHERE id = $1")
        .bind(invoice_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn open_invoice(pool: &PgPool, total: Decimal) -> Uuid {
    let studio_id = insert_studio(pool, "barre").await;
    let family_id = insert_family(pool, studio_id, "Okafor", Some("okafor@example.com")).await;
    insert_open_invoice(pool, studio_id, family_id, total).await
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_event_is_acknowledged_once(pool: PgPool) {
    let invoice_id = open_invoice(&pool, Decimal::new(10000, 2)).await;
    let webhooks = service(&pool);

    let first = webhooks
        .handle_event(payment_event("evt_dup", "pi_dup", invoice_id, 4000))
        .await
        .unwrap();
    assert_eq!(first.outcome, WebhookOutcome::Processed);

    let second = webhooks
        .handle_event(payment_event("evt_dup", "pi_dup", invoice_id, 4000))
        .await
        .unwrap();
    assert_eq!(second.outcome, WebhookOutcome::Duplicate);
    assert!(second.received);

    let (status, paid) = invoice_state(&pool, invoice_id).await;
    assert_eq!(status, "partially_paid");
    assert_eq!(paid, Decimal::new(4000, 2));
    assert_eq!(event_result(&pool, "evt_dup").await, "success");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_event_is_reprocessed(pool: PgPool) {
    let invoice_id = open_invoice(&pool, Decimal::new(5000, 2)).await;
    sqlx::query(
        "INSERT INTO webhook_events (external_event_id, event_type, processing_result, error_message) VALUES ($1, $2, 'error', 'connection reset')",
    )
    .bind("evt_retry")
    .bind("payment_intent.succeeded")
    .execute(&pool)
    .await
    .unwrap();

    let ack = service(&pool)
        .handle_event(payment_event("evt_retry", "pi_retry", invoice_id, 5000))
        .await
        .unwrap();

    assert_eq!(ack.outcome, WebhookOutcome::Processed);
    assert_eq!(event_result(&pool, "evt_retry").await, "success");
    assert_eq!(invoice_state(&pool, invoice_id).await.0, "paid");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_stale_processing_claim_is_taken_over(pool: PgPool) {
    let invoice_id = open_invoice(&pool, Decimal::new(5000, 2)).await;
    let insert = "INSERT INTO webhook_events (external_event_id, event_type, processing_result, received_at) VALUES ($1, 'payment_intent.succeeded', 'processing', $2)";

    sqlx::query(insert)
        .bind("evt_crashed")
        .bind(Utc::now() - Duration::seconds(STALE_CLAIM_SECS + 60))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(insert)
        .bind("evt_in_flight")
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

    let webhooks = service(&pool);
    let in_flight = webhooks
        .handle_event(payment_event("evt_in_flight", "pi_in_flight", invoice_id, 1000))
        .await
        .unwrap();
    assert_eq!(in_flight.outcome, WebhookOutcome::Duplicate);
    assert_eq!(event_result(&pool, "evt_in_flight").await, "processing");

    let crashed = webhooks
        .handle_event(payment_event("evt_crashed", "pi_crashed", invoice_id, 1000))
        .await
        .unwrap();
    assert_eq!(crashed.outcome, WebhookOutcome::Processed);
    assert_eq!(event_result(&pool, "evt_crashed").await, "success");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_provider_payment_capped_and_deduplicated(pool: PgPool) {
    let invoice_id = open_invoice(&pool, Decimal::new(6000, 2)).await;
    let webhooks = service(&pool);

    let first = webhooks
        .handle_event(payment_event("evt_over", "pi_over", invoice_id, 9000))
        .await
        .unwrap();
    assert_eq!(first.outcome, WebhookOutcome::Processed);

    let recorded: Decimal = sqlx::query_scalar("SELECT amount FROM payments WHERE external_payment_id = 'pi_over'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(recorded, Decimal::new(6000, 2));
    assert_eq!(invoice_state(&pool, invoice_id).await, ("paid".to_string(), Decimal::new(6000, 2)));

    // Same intent under a different event id
    let replay = webhooks
        .handle_event(payment_event("evt_over_again", "pi_over", invoice_id, 9000))
        .await
        .unwrap();
    assert_eq!(replay.outcome, WebhookOutcome::Ignored);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE invoice_id = $1")
        .bind(invoice_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cumulative_refunds_apply_deltas(pool: PgPool) {
    let invoice_id = open_invoice(&pool, Decimal::new(10000, 2)).await;
    let webhooks = service(&pool);

    webhooks
        .handle_event(payment_event("evt_pay", "pi_refund", invoice_id, 10000))
        .await
        .unwrap();

    let partial = webhooks.handle_event(refund_event("evt_ref_1", "pi_refund", 3000)).await.unwrap();
    assert_eq!(partial.outcome, WebhookOutcome::Processed);

    let more = webhooks.handle_event(refund_event("evt_ref_2", "pi_refund", 5000)).await.unwrap();
    assert_eq!(more.outcome, WebhookOutcome::Processed);

    // A stale cumulative total changes nothing
    let stale = webhooks.handle_event(refund_event("evt_ref_3", "pi_refund", 5000)).await.unwrap();
    assert_eq!(stale.outcome, WebhookOutcome::Ignored);

    let (refunded, status): (Decimal, String) =
        sqlx::query_as("SELECT refunded_amount, status FROM payments WHERE external_payment_id = 'pi_refund'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(refunded, Decimal::new(5000, 2));
    assert_eq!(status, "succeeded");

    let (invoice_status, paid) = invoice_state(&pool, invoice_id).await;
    assert_eq!(invoice_status, "partially_paid");
    assert_eq!(paid, Decimal::new(5000, 2));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_webhook_endpoint_accepts_bearer_secret(pool: PgPool) {
    let body = json!({ "id": "evt_http", "type": "customer.created", "data": { "object": {} } });

    let response = send(
        build_test_app(pool.clone()),
        request(Method::POST, "/api/v1/webhooks/billing", Some(WEBHOOK_SECRET), Some(body.clone())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outcome"], "ignored");

    let again = send(
        build_test_app(pool.clone()),
        request(Method::POST, "/api/v1/webhooks/billing", Some(WEBHOOK_SECRET), Some(body)),
    )
    .await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_json(again).await["outcome"], "duplicate");
    assert_eq!(event_result(&pool, "evt_http").await, "ignored");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_provider_invoice_mirrored_once_then_paid(pool: PgPool) {
    let studio_id = insert_studio(&pool, "fouette").await;
    let family_id = insert_family(&pool, studio_id, "Moreau", Some("moreau@example.com")).await;
    sqlx::query("UPDATE families SET billing_customer_id = 'cus_moreau' WHERE id = $1")
        .bind(family_id)
        .execute(&pool)
        .await
        .unwrap();

    let invoice_event = |event_id: &str, event_type: &str, paid_cents: i64| -> WebhookEvent {
        serde_json::from_value(json!({
            "id": event_id,
            "type": event_type,
            "data": { "object": {
                "id": "in_moreau",
                "customer": "cus_moreau",
                "amount_due": 8500,
                "amount_paid": paid_cents,
                "payment_intent": "pi_moreau",
                "description": "Spring term"
            }}
        }))
        .unwrap()
    };

    let webhooks = service(&pool);
    for event_id in ["evt_fin_1", "evt_fin_2"] {
        let ack = webhooks
            .handle_event(invoice_event(event_id, "invoice.finalized", 0))
            .await
            .unwrap();
        assert_eq!(ack.outcome, WebhookOutcome::Processed);
    }

    let paid = webhooks
        .handle_event(invoice_event("evt_paid", "invoice.paid", 8500))
        .await
        .unwrap();
    assert_eq!(paid.outcome, WebhookOutcome::Processed);

    let mirrored: Vec<(Uuid, String, Decimal)> =
        sqlx::query_as("SELECT id, status, total FROM invoices WHERE external_invoice_id = 'in_moreau'")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].1, "paid");
    assert_eq!(mirrored[0].2, Decimal::new(8500, 2));
}
