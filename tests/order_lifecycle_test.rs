mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use fabriq_api::services::order_status::TransitionRequest;

async fn create_order(app: &TestApp, code: &str) -> Uuid {
    let body = json!({
        "order_code": code,
        "customer_id": app.acme.customer_id,
        "items": [
            { "product_code": "WIDGET-1", "quantity": 10, "unit_price": 25 },
            { "product_code": "WIDGET-2", "quantity": 2, "unit_price": 100 }
        ]
    });
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&app.acme.sales.token),
            Some(body),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["version"], 1);
    Uuid::parse_str(body["data"]["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn full_lifecycle_appends_history_and_bumps_version() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1001").await;

    for (target, expected_version) in [("approved", 2), ("in_production", 3), ("completed", 4)] {
        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/v1/orders/{order_id}/status"),
                Some(&app.acme.unit_head.token),
                Some(json!({ "target": target })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "transition to {target}: {body}");
        assert_eq!(body["data"]["status"], target);
        assert_eq!(body["data"]["version"], expected_version);
    }

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.sales.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // One row at creation plus one per transition, oldest first.
    let history = body["data"]["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["status"], "pending");
    assert_eq!(history[0]["previous_status"], serde_json::Value::Null);
    assert_eq!(history[3]["status"], "completed");
    assert_eq!(history[3]["previous_status"], "in_production");

    assert_eq!(body["data"]["order"]["total_amount"], "450");
}

#[tokio::test]
async fn illegal_transitions_conflict_and_leave_the_order_untouched() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1002").await;

    // pending -> completed skips the lifecycle.
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.acme.unit_head.token),
            Some(json!({ "target": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.sales.token),
            None,
        )
        .await;
    assert_eq!(body["data"]["order"]["status"], "pending");
    assert_eq!(body["data"]["order"]["version"], 1);
    assert_eq!(body["data"]["status_history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1003").await;

    for body in [
        json!({ "target": "rejected" }),
        json!({ "target": "rejected", "rejection_reason": "   " }),
    ] {
        let (status, _) = app
            .request(
                Method::PUT,
                &format!("/api/v1/orders/{order_id}/status"),
                Some(&app.acme.unit_head.token),
                Some(body),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.acme.unit_head.token),
            Some(json!({ "target": "rejected", "rejection_reason": "credit hold" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rejection_reason"], "credit hold");

    // Rejected is terminal.
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.acme.unit_head.token),
            Some(json!({ "target": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn sales_cannot_approve_but_can_cancel() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1004").await;

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.acme.sales.token),
            Some(json!({ "target": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.acme.sales.token),
            Some(json!({ "target": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "cancel: {body}");
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn deletion_is_limited_to_pending_and_cancelled() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1005").await;

    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{order_id}/status"),
        Some(&app.acme.unit_head.token),
        Some(json!({ "target": "approved" })),
    )
    .await;

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{order_id}/status"),
        Some(&app.acme.unit_head.token),
        Some(json!({ "target": "cancelled" })),
    )
    .await;

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_transitions_have_exactly_one_winner() {
    let app = TestApp::new().await;
    let order_id = create_order(&app, "SO-1006").await;

    let head = fabriq_api::auth::Identity {
        user_id: app.acme.unit_head.user_id,
        role: app.acme.unit_head.role,
        company_id: Some(app.acme.company_id),
        unit: None,
        is_active: true,
    };

    let service = app.state.services.order_status.clone();
    let request = || TransitionRequest {
        target: fabriq_api::services::order_status::OrderStatus::Approved,
        notes: None,
        rejection_reason: None,
    };

    let (a, b) = tokio::join!(
        service.transition(&head, order_id, request()),
        service.transition(&head, order_id, request()),
    );
    assert_eq!(
        a.is_ok() as u8 + b.is_ok() as u8,
        1,
        "exactly one transition must win: {a:?} / {b:?}"
    );

    let (_, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(body["data"]["order"]["status"], "approved");
    assert_eq!(body["data"]["order"]["version"], 2);
    assert_eq!(body["data"]["status_history"].as_array().unwrap().len(), 2);
}
