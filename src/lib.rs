//! Multi-tenant manufacturing ERP core: scoped data access, an order
//! lifecycle state machine, a data-driven permission matrix and scoped
//! reporting, exposed over an axum HTTP API backed by sea-orm.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum::Router;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod scope;
pub mod services;

use auth::{AuthSettings, PermissionMatrix};
use services::customers::CustomerService;
use services::dispatches::DispatchService;
use services::inventory::InventoryService;
use services::order_status::OrderStatusService;
use services::orders::OrderService;
use services::reports::ReportService;

/// Uniform response envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            errors: None,
        }
    }
}

/// Offset pagination envelope. `total` is always counted under the same
/// predicate that produced `items`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Common list parameters for the simple listing endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub order_status: OrderStatusService,
    pub customers: CustomerService,
    pub inventory: InventoryService,
    pub dispatches: DispatchService,
    pub reports: ReportService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        Self {
            orders: OrderService::new(db.clone(), matrix.clone()),
            order_status: OrderStatusService::new(db.clone(), matrix.clone()),
            customers: CustomerService::new(db.clone(), matrix.clone()),
            inventory: InventoryService::new(db.clone(), matrix.clone()),
            dispatches: DispatchService::new(db.clone(), matrix.clone()),
            reports: ReportService::new(db, matrix),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub auth: AuthSettings,
    pub matrix: Arc<PermissionMatrix>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: AuthSettings,
        matrix: Arc<PermissionMatrix>,
    ) -> Self {
        let services = AppServices::new(db.clone(), matrix.clone());
        Self {
            db,
            auth,
            matrix,
            services,
        }
    }
}

impl FromRef<AppState> for AuthSettings {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Assemble the full application router, including the OpenAPI UI and the
/// standard middleware stack.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", handlers::api_routes())
        .merge(handlers::health_routes())
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::api_doc()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(page.total_pages, 3);

        let exact = PaginatedResponse::new(vec![1, 2], 6, 1, 3);
        assert_eq!(exact.total_pages, 2);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}
