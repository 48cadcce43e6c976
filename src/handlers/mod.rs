//! HTTP surface. Handlers stay thin: extract the identity, hand the
//! request to a service, wrap the result. All authorization and scoping
//! decisions live below this layer.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::AppState;

pub mod customers;
pub mod dispatches;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod reports;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route(
            "/orders/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/orders/:id/status", put(orders::update_order_status))
        .route(
            "/customers",
            post(customers::create_customer).get(customers::list_customers),
        )
        .route("/inventory", get(inventory::list_items))
        .route("/dispatches", get(dispatches::list_dispatches))
        .route("/reports/orders/status", get(reports::status_summary))
        .route(
            "/reports/orders/sales-persons",
            get(reports::sales_person_summary),
        )
        .route("/reports/orders/trend", get(reports::order_trend))
        .route(
            "/reports/orders/companies",
            get(reports::company_order_counts),
        )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}
