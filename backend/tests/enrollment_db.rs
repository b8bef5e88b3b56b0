//! Waitlist promotion and capacity against a real database

mod common;

use axum::http::{Method, StatusCode};
use shared::models::{EnrollmentStatus, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use dance_studio_backend::error::AppError;
use dance_studio_backend::services::enrollment::{EnrollInput, EnrollmentService};

use common::*;

struct FullClass {
    studio_id: Uuid,
    family_id: Uuid,
    class_id: Uuid,
    active: Uuid,
    waitlisted: Uuid,
}

/// Capacity-one class with one active student and one on the waitlist
async fn full_class(pool: &PgPool) -> FullClass {
    let studio_id = insert_studio(pool, "plie").await;
    let family_id = insert_family(pool, studio_id, "Lindqvist", Some("lindqvist@example.com")).await;
    let class_id = insert_class(pool, studio_id, Some(1), None).await;

    let first = insert_student(pool, studio_id, family_id, "Astrid").await;
    let second = insert_student(pool, studio_id, family_id, "Nils").await;
    let active = insert_enrollment(pool, studio_id, first, class_id, "active", None).await;
    let waitlisted = insert_enrollment(pool, studio_id, second, class_id, "waitlisted", Some(1)).await;

    FullClass {
        studio_id,
        family_id,
        class_id,
        active,
        waitlisted,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_promote_into_full_class_is_refused(pool: PgPool) {
    let class = full_class(&pool).await;

    let result = EnrollmentService::new(pool.clone())
        .promote(class.studio_id, class.waitlisted)
        .await;
    assert!(matches!(result, Err(AppError::ClassFull(_))));

    let status: String = sqlx::query_scalar("SELECT status FROM enrollments WHERE id = $1")
        .bind(class.waitlisted)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "waitlisted");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_promote_endpoint_answers_conflict_when_full(pool: PgPool) {
    let class = full_class(&pool).await;
    let token = access_token(class.studio_id, UserRole::Owner, None, None);

    let response = send(
        build_test_app(pool),
        request(
            Method::POST,
            &format!("/api/v1/admin/enrollments/{}/promote", class.waitlisted),
            Some(&token),
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "CLASS_FULL");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_promote_succeeds_once_a_seat_frees(pool: PgPool) {
    let class = full_class(&pool).await;
    sqlx::query("UPDATE enrollments SET status = 'dropped', ended_at = NOW() WHERE id = $1")
        .bind(class.active)
        .execute(&pool)
        .await
        .unwrap();

    let promoted = EnrollmentService::new(pool.clone())
        .promote(class.studio_id, class.waitlisted)
        .await
        .unwrap();
    assert_eq!(promoted.status, EnrollmentStatus::Active);
    assert_eq!(promoted.waitlist_position, None);
    assert!(promoted.enrolled_at.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_staff_enrollment_into_full_class_joins_waitlist(pool: PgPool) {
    let class = full_class(&pool).await;
    let third = insert_student(&pool, class.studio_id, class.family_id, "Greta").await;

    let enrollment = EnrollmentService::new(pool.clone())
        .enroll(
            class.studio_id,
            EnrollInput {
                student_id: third,
                class_id: class.class_id,
                notes: None,
            },
            false,
        )
        .await
        .unwrap();

    assert_eq!(enrollment.status, EnrollmentStatus::Waitlisted);
    assert_eq!(enrollment.waitlist_position, Some(2));
}
