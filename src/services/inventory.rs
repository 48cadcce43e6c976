//! Inventory listings. Shop-floor roles are narrowed to their own unit;
//! management and accounting roles see the whole company. That choice is
//! made here, explicitly, because inventory carries a unit column and the
//! resolver refuses to guess.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix};
use crate::entities::inventory_item;
use crate::errors::ServiceError;
use crate::scope::{Scope, ScopeResolver};
use crate::{ListQuery, PaginatedResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryItemResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub unit: Option<String>,
    pub sku: String,
    pub description: String,
    pub on_hand: i32,
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    fn scope_for(&self, identity: &Identity) -> Result<Scope, ServiceError> {
        let scope = if identity.role.is_unit_bound() {
            self.scopes.company_and_unit_scoped(
                identity,
                inventory_item::Column::CompanyId,
                inventory_item::Column::Unit,
            )?
        } else {
            self.scopes
                .company_scoped(identity, inventory_item::Column::CompanyId)?
        };
        Ok(scope)
    }

    #[instrument(skip(self, identity, query))]
    pub async fn list_items(
        &self,
        identity: &Identity,
        query: ListQuery,
    ) -> Result<PaginatedResponse<InventoryItemResponse>, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::INVENTORY, features::MANAGE, Action::View)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read inventory".to_string(),
            ));
        }

        let mut filters = Condition::all();
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            filters = filters.add(inventory_item::Column::Sku.contains(search));
        }

        let scope = self.scope_for(identity)?.and(filters);

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);

        let paginator = scope
            .apply(inventory_item::Entity::find())
            .order_by_asc(inventory_item::Column::Sku)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(|model| InventoryItemResponse {
                id: model.id,
                company_id: model.company_id,
                unit: model.unit,
                sku: model.sku,
                description: model.description,
                on_hand: model.on_hand,
                unit_cost: model.unit_cost,
                created_at: model.created_at,
            })
            .collect();

        Ok(PaginatedResponse::new(items, total, page, limit))
    }
}
