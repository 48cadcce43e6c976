use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::auth::Identity;
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState, ListQuery};

#[utoipa::path(
    get,
    path = "/api/v1/dispatches",
    params(ListQuery),
    responses((status = 200, description = "Scoped dispatch page")),
    security(("bearer_auth" = [])),
    tag = "dispatches"
)]
pub async fn list_dispatches(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .dispatches
        .list_dispatches(&identity, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}
