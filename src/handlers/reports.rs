use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::auth::Identity;
use crate::errors::ServiceError;
use crate::services::reports::{ReportRange, TrendParams};
use crate::{ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/reports/orders/status",
    params(ReportRange),
    responses((status = 200, description = "Per-status counts and totals")),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn status_summary(
    State(state): State<AppState>,
    identity: Identity,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state
        .services
        .reports
        .status_summary(&identity, range)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/orders/sales-persons",
    params(ReportRange),
    responses((status = 200, description = "Per-salesperson performance rows")),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn sales_person_summary(
    State(state): State<AppState>,
    identity: Identity,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .reports
        .sales_person_summary(&identity, range)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/orders/trend",
    params(TrendParams),
    responses((status = 200, description = "Zero-filled activity series with growth")),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn order_trend(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<TrendParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let trend = state
        .services
        .reports
        .order_trend(&identity, params)
        .await?;
    Ok(Json(ApiResponse::success(trend)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/orders/companies",
    responses(
        (status = 200, description = "Cross-company roll-up"),
        (status = 403, description = "Restricted to super admins")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn company_order_counts(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .reports
        .company_order_counts(&identity)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}
