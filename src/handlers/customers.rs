use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::Identity;
use crate::errors::ServiceError;
use crate::services::customers::CreateCustomerRequest;
use crate::{ApiResponse, AppState, ListQuery};

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(ListQuery),
    responses((status = 200, description = "Scoped customer page")),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .customers
        .list_customers(&identity, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created"),
        (status = 403, description = "Caller may not create customers")
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state
        .services
        .customers
        .create_customer(&identity, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            customer,
            "Customer created",
        )),
    ))
}
