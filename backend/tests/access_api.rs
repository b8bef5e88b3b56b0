//! Router-level access checks: back-office guard, cron secret and webhook
//! authentication, driven through the full middleware stack.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use shared::models::UserRole;
use sqlx::PgPool;
use uuid::Uuid;

use dance_studio_backend::services::auth::{AuthService, RegisterStudioInput};

use common::*;

#[tokio::test]
async fn test_instructor_token_refused_on_admin_attendance() {
    let studio_id = Uuid::new_v4();
    let class_id = Uuid::new_v4();
    let token = access_token(studio_id, UserRole::Instructor, Some(Uuid::new_v4()), None);
    let uri = format!("/api/v1/admin/attendance/classes/{class_id}");

    let list = send(build_offline_app(), request(Method::GET, &uri, Some(&token), None)).await;
    assert_eq!(list.status(), StatusCode::FORBIDDEN);

    let body = json!({ "date": "2024-09-03", "marks": [] });
    let mark = send(build_offline_app(), request(Method::POST, &uri, Some(&token), Some(body))).await;
    assert_eq!(mark.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_admin_roles_refused_on_back_office() {
    let studio_id = Uuid::new_v4();
    for (role, staff_id, family_id) in [
        (UserRole::Instructor, Some(Uuid::new_v4()), None),
        (UserRole::Parent, None, Some(Uuid::new_v4())),
    ] {
        let token = access_token(studio_id, role, staff_id, family_id);
        let response = send(
            build_offline_app(),
            request(Method::GET, "/api/v1/admin/students", Some(&token), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "role {:?}", role);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
    }
}

#[tokio::test]
async fn test_back_office_requires_token() {
    let response = send(
        build_offline_app(),
        request(Method::GET, "/api/v1/admin/students", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_rejects_wrong_or_missing_secret() {
    for token in [None, Some("not-the-cron-secret"), Some("cron-test-secreT")] {
        let response = send(
            build_offline_app(),
            request(Method::POST, "/api/v1/cron/dispatch-messages", token, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {:?}", token);
    }
}

#[tokio::test]
async fn test_webhook_with_extreme_timestamp_is_rejected() {
    let body = json!({ "id": "evt_1", "type": "payment_intent.succeeded", "data": { "object": {} } });
    for header in [
        "t=-9223372036854775808,v1=00",
        "t=9223372036854775807,v1=00",
        "t=abc,v1=00",
    ] {
        let mut req = request(Method::POST, "/api/v1/webhooks/billing", None, Some(body.clone()));
        req.headers_mut()
            .insert("stripe-signature", header.parse().unwrap());
        let response = send(build_offline_app(), req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {header}");
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_instructor_sees_only_own_class_attendance(pool: PgPool) {
    let studio_id = insert_studio(&pool, "pointe").await;
    let instructor = insert_staff(&pool, studio_id, "Mara").await;
    let colleague = insert_staff(&pool, studio_id, "Jonas").await;
    let own_class = insert_class(&pool, studio_id, Some(12), Some(instructor)).await;
    let other_class = insert_class(&pool, studio_id, Some(12), Some(colleague)).await;

    let token = access_token(studio_id, UserRole::Instructor, Some(instructor), None);

    let own = send(
        build_test_app(pool.clone()),
        request(
            Method::GET,
            &format!("/api/v1/instructor/classes/{own_class}/attendance"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(own.status(), StatusCode::OK);
    assert_eq!(body_json(own).await, json!([]));

    let foreign = send(
        build_test_app(pool.clone()),
        request(
            Method::GET,
            &format!("/api/v1/instructor/classes/{other_class}/attendance"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    // The same class stays reachable from the back office for the owner
    let owner = access_token(studio_id, UserRole::Owner, None, None);
    let admin = send(
        build_test_app(pool),
        request(
            Method::GET,
            &format!("/api/v1/admin/attendance/classes/{other_class}"),
            Some(&owner),
            None,
        ),
    )
    .await;
    assert_eq!(admin.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_registration_uses_configured_currency(pool: PgPool) {
    let mut config = test_config();
    config.billing.currency = "cad".to_string();
    let auth = AuthService::new(pool.clone(), &config);

    let registered = auth
        .register_studio(RegisterStudioInput {
            studio_name: "Arabesque Academy".to_string(),
            studio_slug: "Arabesque".to_string(),
            owner_name: "Ines Duval".to_string(),
            email: "ines@example.com".to_string(),
            password: "tendu2024".to_string(),
            phone: None,
            timezone: None,
        })
        .await
        .unwrap();
    assert_eq!(registered.studio_slug, "arabesque");

    let currency: String = sqlx::query_scalar("SELECT currency FROM studios WHERE id = $1")
        .bind(registered.studio_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(currency, "CAD");
}
