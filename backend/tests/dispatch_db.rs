//! Scheduled message dispatch against a real database

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use dance_studio_backend::create_app;
use dance_studio_backend::services::messaging::{MessagingService, SENDING_LEASE_SECS};

use common::*;

async fn insert_message(
    pool: &PgPool,
    studio_id: Uuid,
    status: &str,
    scheduled_for: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO scheduled_messages (studio_id, subject, body, channel, target_type, scheduled_for, status, claimed_at)
        VALUES ($1, 'Recital dress rehearsal', 'Arrive 30 minutes early.', 'email', 'everyone', $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(studio_id)
    .bind(scheduled_for)
    .bind(status)
    .bind(claimed_at)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn message_state(pool: &PgPool, message_id: Uuid) -> (String, i32, i32) {
    sqlx::query_as("SELECT status, recipient_count, failed_count FROM scheduled_messages WHERE id = $1")
        .bind(message_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Studio with `count` reachable families, each with one active student
async fn studio_with_families(pool: &PgPool, count: usize) -> (Uuid, Vec<Uuid>) {
    let studio_id = insert_studio(pool, "jete").await;
    let mut families = Vec::with_capacity(count);
    for i in 0..count {
        let family_id = insert_family(pool, studio_id, &format!("Family {i}"), Some(&format!("family{i}@example.com"))).await;
        insert_student(pool, studio_id, family_id, &format!("Dancer{i}")).await;
        families.push(family_id);
    }
    (studio_id, families)
}

#[sqlx::test(migrations = "./migrations")]
async fn test_one_failing_recipient_still_sends_message(pool: PgPool) {
    let (studio_id, families) = studio_with_families(&pool, 3).await;
    let message_id = insert_message(&pool, studio_id, "scheduled", Utc::now() - Duration::minutes(1), None).await;

    let notifier = RecordingNotifier::failing_for(vec![families[1]]);
    let summary = MessagingService::new(pool.clone())
        .dispatch_due_messages(Utc::now(), &notifier)
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.deliveries, 3);
    assert_eq!(summary.delivery_failures, 1);
    assert_eq!(notifier.sent_count(), 3);

    assert_eq!(message_state(&pool, message_id).await, ("sent".to_string(), 3, 1));

    let failed_family: Uuid = sqlx::query_scalar(
        "SELECT family_id FROM message_deliveries WHERE message_id = $1 AND status = 'failed'",
    )
    .bind(message_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(failed_family, families[1]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_future_message_is_not_claimed(pool: PgPool) {
    let (studio_id, _) = studio_with_families(&pool, 1).await;
    let message_id = insert_message(&pool, studio_id, "scheduled", Utc::now() + Duration::hours(2), None).await;

    let notifier = RecordingNotifier::default();
    let summary = MessagingService::new(pool.clone())
        .dispatch_due_messages(Utc::now(), &notifier)
        .await
        .unwrap();

    assert_eq!(summary.claimed, 0);
    assert_eq!(notifier.sent_count(), 0);
    assert_eq!(message_state(&pool, message_id).await.0, "scheduled");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_expired_sending_lease_is_reclaimed(pool: PgPool) {
    let (studio_id, _) = studio_with_families(&pool, 2).await;
    let due = Utc::now() - Duration::hours(1);
    let abandoned = insert_message(
        &pool,
        studio_id,
        "sending",
        due,
        Some(Utc::now() - Duration::seconds(SENDING_LEASE_SECS + 60)),
    )
    .await;
    let in_progress = insert_message(&pool, studio_id, "sending", due, Some(Utc::now() - Duration::seconds(30))).await;

    let notifier = RecordingNotifier::default();
    let summary = MessagingService::new(pool.clone())
        .dispatch_due_messages(Utc::now(), &notifier)
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(message_state(&pool, abandoned).await, ("sent".to_string(), 2, 0));
    assert_eq!(message_state(&pool, in_progress).await.0, "sending");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cron_dispatch_endpoint_runs_due_messages(pool: PgPool) {
    let (studio_id, families) = studio_with_families(&pool, 2).await;
    let message_id = insert_message(&pool, studio_id, "scheduled", Utc::now() - Duration::minutes(5), None).await;

    let notifier = Arc::new(RecordingNotifier::failing_for(vec![families[0]]));
    let app = create_app(test_state(pool.clone(), notifier.clone()));

    let response = send(
        app,
        request(Method::POST, "/api/v1/cron/dispatch-messages", Some(CRON_SECRET), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["claimed"], 1);
    assert_eq!(body["delivery_failures"], 1);
    assert_eq!(notifier.sent_count(), 2);
    assert_eq!(message_state(&pool, message_id).await, ("sent".to_string(), 2, 1));
}
