//! Customers are directly company-scoped; this service is the straight
//! path through the scope resolver, without the salesperson indirection
//! orders need.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix};
use crate::entities::customer;
use crate::errors::ServiceError;
use crate::scope::ScopeResolver;
use crate::{ListQuery, PaginatedResponse};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub city: Option<String>,
    pub sales_contact_id: Option<Uuid>,
    /// Only honored for SuperAdmin; scoped callers always create into
    /// their own company.
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub sales_contact_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn map_customer(model: customer::Model) -> CustomerResponse {
    CustomerResponse {
        id: model.id,
        company_id: model.company_id,
        name: model.name,
        city: model.city,
        sales_contact_id: model.sales_contact_id,
        is_active: model.is_active,
        created_at: model.created_at,
    }
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    #[instrument(skip(self, identity, query))]
    pub async fn list_customers(
        &self,
        identity: &Identity,
        query: ListQuery,
    ) -> Result<PaginatedResponse<CustomerResponse>, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::CUSTOMERS, features::MANAGE, Action::View)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read customers".to_string(),
            ));
        }

        let mut filters = Condition::all();
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            filters = filters.add(customer::Column::Name.contains(search));
        }

        let scope = self
            .scopes
            .company_scoped(identity, customer::Column::CompanyId)?
            .and(filters);

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, 100);

        let paginator = scope
            .apply(customer::Entity::find())
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(map_customer)
            .collect();

        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self, identity, request))]
    pub async fn create_customer(
        &self,
        identity: &Identity,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        if !self
            .matrix
            .can(identity, modules::CUSTOMERS, features::MANAGE, Action::Add)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to create customers".to_string(),
            ));
        }

        request.validate()?;

        let company_id = if identity.is_super_admin() {
            request.company_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "company_id is required when creating as super admin".to_string(),
                )
            })?
        } else {
            identity.company_id.ok_or_else(|| {
                ServiceError::Forbidden(
                    "Account has no company assignment; access is denied until it is remediated"
                        .to_string(),
                )
            })?
        };

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(request.name.clone()),
            city: Set(request.city.clone()),
            sales_contact_id: Set(request.sales_contact_id),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(customer_id = %model.id, company_id = %company_id, "customer created");
        Ok(map_customer(model))
    }
}
