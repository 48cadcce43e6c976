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
    path = "/api/v1/inventory",
    params(ListQuery),
    responses((status = 200, description = "Scoped inventory page")),
    security(("bearer_auth" = [])),
    tag = "inventory"
)]
pub async fn list_items(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.inventory.list_items(&identity, query).await?;
    Ok(Json(ApiResponse::success(page)))
}
