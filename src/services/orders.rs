//! Order CRUD. Every read goes through the order scope predicate; every
//! mutation goes through the permission matrix first. Status changes and
//! deletion live in [`super::order_status`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix, Role};
use crate::entities::{customer, order, order_item, order_status_history, user};
use crate::errors::ServiceError;
use crate::scope::ScopeResolver;
use crate::services::order_status::OrderStatus;
use crate::PaginatedResponse;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    #[validate(length(min = 1, max = 50, message = "Product code must be 1-50 characters"))]
    pub product_code: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50, message = "Order code must be 1-50 characters"))]
    pub order_code: String,
    pub customer_id: Uuid,
    /// Defaults to the caller; managers may book orders for any
    /// salesperson of their own company.
    pub sales_person_id: Option<Uuid>,
    #[validate(length(min = 1, message = "An order needs at least one line item"))]
    pub items: Vec<OrderItemInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Substring match on the order code.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_code: String,
    pub customer_id: Uuid,
    pub sales_person_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_code: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryEntry {
    pub status: String,
    pub previous_status: Option<String>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub status_history: Vec<StatusHistoryEntry>,
}

pub(crate) fn map_order(model: order::Model) -> Result<OrderResponse, ServiceError> {
    let status = OrderStatus::from_str(&model.status).map_err(|_| {
        ServiceError::InternalError(format!(
            "order {} carries unknown status '{}'",
            model.id, model.status
        ))
    })?;
    Ok(OrderResponse {
        id: model.id,
        order_code: model.order_code,
        customer_id: model.customer_id,
        sales_person_id: model.sales_person_id,
        status,
        total_amount: model.total_amount,
        rejection_reason: model.rejection_reason,
        approved_by: model.approved_by,
        approved_at: model.approved_at,
        completed_by: model.completed_by,
        completed_at: model.completed_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    #[instrument(skip(self, identity, request), fields(order_code = %request.order_code))]
    pub async fn create_order(
        &self,
        identity: &Identity,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::ORDERS, features::MANAGE, Action::Add)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to create orders".to_string(),
            ));
        }

        request.validate()?;
        for item in &request.items {
            item.validate()?;
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Unit price cannot be negative".to_string(),
                ));
            }
        }

        let sales_person_id = request.sales_person_id.unwrap_or(identity.user_id);
        let sales_person = user::Entity::find_by_id(sales_person_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Sales person does not exist".to_string())
            })?;

        let sales_role = Role::from_str(&sales_person.role).map_err(|_| {
            ServiceError::InternalError(format!(
                "user {sales_person_id} carries unknown role '{}'",
                sales_person.role
            ))
        })?;
        if !Role::order_owning().contains(&sales_role) {
            return Err(ServiceError::ValidationError(format!(
                "Users with role '{sales_role}' cannot own orders"
            )));
        }

        // The order's company is the salesperson's company; a scoped
        // caller may only book into their own.
        let order_company = sales_person.company_id.ok_or_else(|| {
            ServiceError::ValidationError(
                "Sales person has no company assignment".to_string(),
            )
        })?;
        if !identity.is_super_admin() && !identity.belongs_to_company(order_company) {
            return Err(ServiceError::Forbidden(
                "Sales person belongs to a different company".to_string(),
            ));
        }

        let customer = customer::Entity::find_by_id(request.customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Customer does not exist".to_string()))?;
        if customer.company_id != order_company {
            return Err(ServiceError::ValidationError(
                "Customer belongs to a different company".to_string(),
            ));
        }

        let total_amount: Decimal = request
            .items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_code: Set(request.order_code.clone()),
            customer_id: Set(request.customer_id),
            sales_person_id: Set(sales_person_id),
            status: Set(OrderStatus::Pending.to_string()),
            total_amount: Set(total_amount),
            rejection_reason: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
            completed_by: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        for item in &request.items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_code: Set(item.product_code.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
            }
            .insert(&txn)
            .await?;
        }

        // The audit trail starts at creation.
        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(OrderStatus::Pending.to_string()),
            previous_status: Set(None),
            updated_by: Set(identity.user_id),
            updated_at: Set(now),
            notes: Set(request.notes.clone()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(order_id = %order_id, actor = %identity.user_id, "order created");
        map_order(order_model)
    }

    /// Scoped, paginated listing. The same predicate feeds the page query
    /// and the total count, so `total` always matches what the full list
    /// would enumerate.
    #[instrument(skip(self, identity, params))]
    pub async fn list_orders(
        &self,
        identity: &Identity,
        params: OrderListParams,
    ) -> Result<PaginatedResponse<OrderResponse>, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::ORDERS, features::MANAGE, Action::View)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read orders".to_string(),
            ));
        }

        let mut filters = Condition::all();
        if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
            filters = filters.add(order::Column::OrderCode.contains(search));
        }
        if let Some(status) = params.status {
            filters = filters.add(order::Column::Status.eq(status.to_string()));
        }
        if let Some(from) = params.from {
            filters = filters.add(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = params.to {
            filters = filters.add(order::Column::CreatedAt.lte(to));
        }

        let scope = self.scopes.orders(identity).await?.and(filters);

        let page = params.page.max(1);
        let limit = params.limit.clamp(1, 100);

        let query = scope
            .apply(order::Entity::find())
            .order_by_desc(order::Column::CreatedAt);
        let paginator = query.paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let items = models
            .into_iter()
            .map(map_order)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    /// Fetch one order with its line items and full status history. An
    /// order outside the caller's scope reads as absent.
    #[instrument(skip(self, identity), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        identity: &Identity,
        order_id: Uuid,
    ) -> Result<OrderDetailResponse, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::ORDERS, features::MANAGE, Action::View)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read orders".to_string(),
            ));
        }

        let scope = self.scopes.orders(identity).await?;
        let model = scope
            .apply(order::Entity::find_by_id(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_code: item.product_code,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let status_history = order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::UpdatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|entry| StatusHistoryEntry {
                status: entry.status,
                previous_status: entry.previous_status,
                updated_by: entry.updated_by,
                updated_at: entry.updated_at,
                notes: entry.notes,
            })
            .collect();

        Ok(OrderDetailResponse {
            order: map_order(model)?,
            items,
            status_history,
        })
    }
}
