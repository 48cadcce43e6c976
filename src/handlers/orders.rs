use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::ServiceError;
use crate::services::order_status::TransitionRequest;
use crate::services::orders::{map_order, CreateOrderRequest, OrderListParams};
use crate::{ApiResponse, AppState};

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created"),
        (status = 403, description = "Caller may not create orders"),
        (status = 422, description = "Invalid order payload")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(&identity, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(order, "Order created")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListParams),
    responses((status = 200, description = "Scoped order page")),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<OrderListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.orders.list_orders(&identity, params).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and history"),
        (status = 404, description = "Order absent or outside the caller's scope")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.orders.get_order(&identity, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Status transitioned"),
        (status = 409, description = "Illegal transition or concurrent change"),
        (status = 422, description = "Rejection without a reason")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let model = state
        .services
        .order_status
        .transition(&identity, id, request)
        .await?;
    let order = map_order(model)?;
    Ok(Json(ApiResponse::success_with_message(
        order,
        "Order status updated",
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 409, description = "Order is past the deletable stages")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .order_status
        .delete_order(&identity, id)
        .await?;
    Ok(Json(ApiResponse::success_with_message((), "Order deleted")))
}
