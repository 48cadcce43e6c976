//! Dispatch listings, scoped the same way as inventory: unit-bound roles
//! see their unit, everyone else the whole company.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix};
use crate::entities::dispatch;
use crate::errors::ServiceError;
use crate::scope::{Scope, ScopeResolver};
use crate::{ListQuery, PaginatedResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub unit: Option<String>,
    pub order_id: Uuid,
    pub vehicle_no: Option<String>,
    pub status: String,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DispatchService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl DispatchService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    fn scope_for(&self, identity: &Identity) -> Result<Scope, ServiceError> {
        let scope = if identity.role.is_unit_bound() {
            self.scopes.company_and_unit_scoped(
                identity,
                dispatch::Column::CompanyId,
                dispatch::Column::Unit,
            )?
        } else {
            self.scopes
                .company_scoped(identity, dispatch::Column::CompanyId)?
        };
        Ok(scope)
    }

    #[instrument(skip(self, identity, query))]
    pub async fn list_dispatches(
        &self,
        identity: &Identity,
        query: ListQuery,
    ) -> Result<PaginatedResponse<DispatchResponse>, ServiceError> {
        if !self.matrix.can(
            identity,
            modules::DISPATCHES,
            features::MANAGE,
            Action::View,
        ) {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read dispatches".to_string(),
            ));
        }

        let mut filters = Condition::all();
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            filters = filters.add(dispatch::Column::VehicleNo.contains(search));
        }

        let scope = self.scope_for(identity)?.and(filters);

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);

        let paginator = scope
            .apply(dispatch::Entity::find())
            .order_by_desc(dispatch::Column::DispatchedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|model| DispatchResponse {
                id: model.id,
                company_id: model.company_id,
                unit: model.unit,
                order_id: model.order_id,
                vehicle_no: model.vehicle_no,
                status: model.status,
                dispatched_at: model.dispatched_at,
            })
            .collect();

        Ok(PaginatedResponse::new(items, total, page, limit))
    }
}
