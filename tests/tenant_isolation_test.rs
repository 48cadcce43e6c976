mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use fabriq_api::auth::{Identity, Role};

async fn create_acme_order(app: &TestApp, code: &str) -> Uuid {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&app.acme.sales.token),
            Some(json!({
                "order_code": code,
                "customer_id": app.acme.customer_id,
                "items": [{ "product_code": "WIDGET-1", "quantity": 1, "unit_price": 50 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    Uuid::parse_str(body["data"]["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn orders_are_invisible_across_companies() {
    let app = TestApp::new().await;
    let order_id = create_acme_order(&app, "SO-2001").await;

    // The other company's listing does not contain it.
    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/orders",
            Some(&app.globex.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    // Direct fetch by id reads as absent, not as forbidden.
    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            Some(&app.globex.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // And so does a cross-company transition attempt.
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&app.globex.unit_head.token),
            Some(json!({ "target": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The owning company still sees it.
    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/orders",
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn orders_cannot_be_booked_against_foreign_customers() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&app.globex.sales.token),
            Some(json!({
                "order_code": "SO-2002",
                "customer_id": app.acme.customer_id,
                "items": [{ "product_code": "WIDGET-1", "quantity": 1, "unit_price": 50 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn scoped_roles_without_company_claims_are_denied() {
    let app = TestApp::new().await;

    // A sales token with no company claim is a misconfigured account and
    // must fail closed, not fall back to any wider scope.
    let broken = Identity {
        user_id: app.acme.sales.user_id,
        role: Role::Sales,
        company_id: None,
        unit: None,
        is_active: true,
    };
    let token = app.mint_token(&broken);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/v1/customers", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_tokens_are_rejected() {
    let app = TestApp::new().await;
    let inactive = Identity {
        user_id: app.acme.sales.user_id,
        role: Role::Sales,
        company_id: Some(app.acme.company_id),
        unit: None,
        is_active: false,
    };
    let token = app.mint_token(&inactive);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customer_listings_are_company_scoped() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/customers",
            Some(&app.acme.sales.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["company_id"].as_str().unwrap(),
        app.acme.company_id.to_string()
    );
}

#[tokio::test]
async fn reports_aggregate_only_the_callers_scope() {
    let app = TestApp::new().await;
    create_acme_order(&app, "SO-2003").await;
    create_acme_order(&app, "SO-2004").await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/reports/orders/status",
            Some(&app.acme.sales.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_orders"], 2);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/reports/orders/status",
            Some(&app.globex.sales.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_orders"], 0);
}

#[tokio::test]
async fn cross_company_rollup_is_super_admin_only() {
    let app = TestApp::new().await;
    create_acme_order(&app, "SO-2005").await;

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/reports/orders/companies",
            Some(&app.acme.unit_head.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = Identity {
        user_id: Uuid::new_v4(),
        role: Role::SuperAdmin,
        company_id: None,
        unit: None,
        is_active: true,
    };
    let token = app.mint_token(&admin);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/reports/orders/companies",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["company_name"], "Acme Industries");
    assert_eq!(rows[0]["order_count"], 1);
}

#[tokio::test]
async fn trend_series_is_zero_filled_for_the_whole_window() {
    let app = TestApp::new().await;
    create_acme_order(&app, "SO-2006").await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/reports/orders/trend?days=7",
            Some(&app.acme.sales.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "trend: {body}");

    let points = body["data"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 7);
    let total: u64 = points
        .iter()
        .map(|p| p["order_count"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 1);
    // No preceding activity: growth reports 0 rather than infinity.
    assert_eq!(body["data"]["order_growth_pct"], 0.0);
}
