//! OpenAPI document assembly for the swagger UI.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::errors::ErrorResponse;
use crate::handlers;
use crate::services::customers::{CreateCustomerRequest, CustomerResponse};
use crate::services::dispatches::DispatchResponse;
use crate::services::inventory::InventoryItemResponse;
use crate::services::order_status::{OrderStatus, TransitionRequest};
use crate::services::orders::{
    CreateOrderRequest, OrderDetailResponse, OrderItemInput, OrderItemResponse, OrderResponse,
    StatusHistoryEntry,
};
use crate::services::reports::{
    CompanyOrderCount, OrderTrend, SalesPersonStats, StatusBucket, StatusSummary, TrendBucket,
    TrendPoint,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::orders::delete_order,
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::inventory::list_items,
        handlers::dispatches::list_dispatches,
        handlers::reports::status_summary,
        handlers::reports::sales_person_summary,
        handlers::reports::order_trend,
        handlers::reports::company_order_counts,
        handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        OrderStatus,
        TransitionRequest,
        CreateOrderRequest,
        OrderItemInput,
        OrderResponse,
        OrderItemResponse,
        OrderDetailResponse,
        StatusHistoryEntry,
        CreateCustomerRequest,
        CustomerResponse,
        InventoryItemResponse,
        DispatchResponse,
        StatusBucket,
        StatusSummary,
        SalesPersonStats,
        TrendBucket,
        TrendPoint,
        OrderTrend,
        CompanyOrderCount,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "orders", description = "Order lifecycle and listings"),
        (name = "customers", description = "Customer management"),
        (name = "inventory", description = "Stock listings"),
        (name = "dispatches", description = "Outbound dispatch listings"),
        (name = "reports", description = "Scoped aggregation endpoints"),
        (name = "health", description = "Liveness and readiness"),
    ),
    info(
        title = "fabriq-api",
        description = "Multi-tenant manufacturing ERP core API",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn api_doc() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
