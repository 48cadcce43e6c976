//! Scope Resolver: turns an [`Identity`] into the filter predicate that
//! restricts a query to the records the caller is authorized to see.
//!
//! Directly scoped resources (customers, inventory, dispatches) filter on
//! their own `company_id`/`unit` columns. Orders are scoped indirectly:
//! an order's company is derived from its salesperson's company, so the
//! resolver joins through the users table. That two-step join lives here
//! and only here — endpoints must never re-derive it.
//!
//! A company-scoped identity without a `company_id` is a misconfigured
//! account. The resolver fails closed: it returns an error the caller
//! surfaces as `Forbidden`, and never widens to "all records".

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Select,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::entities::user;
use crate::errors::ServiceError;

/// The filter predicate for one identity/resource pair. Composes with
/// caller-supplied filters (search, status, date range) by logical AND
/// only; a scope can narrow further but never widen.
#[derive(Debug, Clone)]
pub enum Scope {
    /// SuperAdmin: no restriction.
    Unrestricted,
    /// Everyone else: an AND-composed condition.
    Restricted(Condition),
}

impl Scope {
    /// A predicate that matches zero records, for callers that prefer an
    /// empty page over an error on misconfigured accounts.
    pub fn match_nothing() -> Self {
        Scope::Restricted(Condition::all().add(Expr::value(false)))
    }

    /// Narrow this scope with an additional condition (always AND).
    pub fn and(self, condition: Condition) -> Self {
        match self {
            Scope::Unrestricted => Scope::Restricted(Condition::all().add(condition)),
            Scope::Restricted(existing) => Scope::Restricted(existing.add(condition)),
        }
    }

    /// Apply the predicate to a query.
    pub fn apply<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        match self {
            Scope::Unrestricted => select,
            Scope::Restricted(condition) => select.filter(condition.clone()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("role '{role}' requires a company assignment but the account has none")]
    MissingCompany { role: Role },

    #[error("role '{role}' requires a unit assignment but the account has none")]
    MissingUnit { role: Role },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl From<ScopeError> for ServiceError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::MissingCompany { role } => ServiceError::Forbidden(format!(
                "Account with role '{role}' has no company assignment; access is denied until it is remediated"
            )),
            ScopeError::MissingUnit { role } => ServiceError::Forbidden(format!(
                "Account with role '{role}' has no unit assignment; access is denied until it is remediated"
            )),
            ScopeError::Db(err) => ServiceError::DatabaseError(err),
        }
    }
}

#[derive(Clone)]
pub struct ScopeResolver {
    db: Arc<DatabaseConnection>,
}

impl ScopeResolver {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn require_company(identity: &Identity) -> Result<Uuid, ScopeError> {
        identity.company_id.ok_or_else(|| {
            warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                "scoped role without company assignment; failing closed"
            );
            ScopeError::MissingCompany {
                role: identity.role,
            }
        })
    }

    /// Scope for resources that carry `company_id` directly.
    pub fn company_scoped<C>(&self, identity: &Identity, company_col: C) -> Result<Scope, ScopeError>
    where
        C: ColumnTrait,
    {
        if identity.is_super_admin() {
            return Ok(Scope::Unrestricted);
        }
        let company_id = Self::require_company(identity)?;
        Ok(Scope::Restricted(
            Condition::all().add(company_col.eq(company_id)),
        ))
    }

    /// Scope for resources that carry both `company_id` and `unit`. Unit
    /// narrowing is an explicit caller decision: naming the unit column
    /// while the identity has no unit is an error, never a silent
    /// company-wide fallback.
    pub fn company_and_unit_scoped<C, U>(
        &self,
        identity: &Identity,
        company_col: C,
        unit_col: U,
    ) -> Result<Scope, ScopeError>
    where
        C: ColumnTrait,
        U: ColumnTrait,
    {
        if identity.is_super_admin() {
            return Ok(Scope::Unrestricted);
        }
        let company_id = Self::require_company(identity)?;
        let unit = identity.unit.clone().ok_or_else(|| {
            warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                "unit-bound role without unit assignment; failing closed"
            );
            ScopeError::MissingUnit {
                role: identity.role,
            }
        })?;
        Ok(Scope::Restricted(
            Condition::all()
                .add(company_col.eq(company_id))
                .add(unit_col.eq(unit)),
        ))
    }

    /// Scope for orders. Orders do not store a company id; affiliation is
    /// derived from the salesperson, so the predicate is built in two
    /// steps: resolve the company's order-owning user ids, then restrict
    /// `sales_person_id` to that set. An empty set matches nothing.
    pub async fn orders(&self, identity: &Identity) -> Result<Scope, ScopeError> {
        if identity.is_super_admin() {
            return Ok(Scope::Unrestricted);
        }
        let company_id = Self::require_company(identity)?;
        let sales_person_ids = self.order_owning_user_ids(company_id).await?;
        Ok(Scope::Restricted(Condition::all().add(
            crate::entities::order::Column::SalesPersonId.is_in(sales_person_ids),
        )))
    }

    /// The user ids of a company that may own orders. Deactivated users
    /// stay in the set: their historical orders still belong to the
    /// company.
    pub async fn order_owning_user_ids(&self, company_id: Uuid) -> Result<Vec<Uuid>, ScopeError> {
        let roles: Vec<String> = Role::order_owning()
            .iter()
            .map(|role| role.to_string())
            .collect();

        let ids = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::CompanyId.eq(company_id))
            .filter(user::Column::Role.is_in(roles))
            .into_tuple::<Uuid>()
            .all(&*self.db)
            .await?;

        Ok(ids)
    }

    /// Resolve an order's company through its salesperson. The single
    /// home of the order -> user -> company indirection.
    pub async fn resolve_order_company(
        &self,
        sales_person_id: Uuid,
    ) -> Result<Option<Uuid>, ScopeError> {
        let sales_person = user::Entity::find_by_id(sales_person_id)
            .one(&*self.db)
            .await?;
        Ok(sales_person.and_then(|u| u.company_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::customer;
    use sea_orm::Database;

    fn identity(role: Role, company_id: Option<Uuid>, unit: Option<&str>) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
            company_id,
            unit: unit.map(str::to_string),
            is_active: true,
        }
    }

    async fn resolver() -> ScopeResolver {
        // The sync scope constructors never touch the connection; an
        // in-memory handle keeps the constructor honest.
        let db = Database::connect("sqlite::memory:").await.unwrap();
        ScopeResolver::new(Arc::new(db))
    }

    #[tokio::test]
    async fn super_admin_is_unrestricted() {
        let resolver = resolver().await;
        let admin = identity(Role::SuperAdmin, None, None);
        let scope = resolver
            .company_scoped(&admin, customer::Column::CompanyId)
            .unwrap();
        assert!(matches!(scope, Scope::Unrestricted));
    }

    #[tokio::test]
    async fn scoped_role_without_company_fails_closed() {
        let resolver = resolver().await;
        for role in [Role::UnitHead, Role::Sales, Role::Accounts] {
            let broken = identity(role, None, None);
            let err = resolver
                .company_scoped(&broken, customer::Column::CompanyId)
                .unwrap_err();
            assert!(matches!(err, ScopeError::MissingCompany { .. }));
        }
    }

    #[tokio::test]
    async fn unit_scoping_requires_a_unit_assignment() {
        let resolver = resolver().await;
        let company = Uuid::new_v4();

        let without_unit = identity(Role::Production, Some(company), None);
        let err = resolver
            .company_and_unit_scoped(
                &without_unit,
                crate::entities::inventory_item::Column::CompanyId,
                crate::entities::inventory_item::Column::Unit,
            )
            .unwrap_err();
        assert!(matches!(err, ScopeError::MissingUnit { .. }));

        let with_unit = identity(Role::Production, Some(company), Some("unit-a"));
        let scope = resolver
            .company_and_unit_scoped(
                &with_unit,
                crate::entities::inventory_item::Column::CompanyId,
                crate::entities::inventory_item::Column::Unit,
            )
            .unwrap();
        assert!(matches!(scope, Scope::Restricted(_)));
    }

    #[tokio::test]
    async fn missing_company_surfaces_as_forbidden() {
        let err: ServiceError = ScopeError::MissingCompany { role: Role::Sales }.into();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn scopes_compose_by_and_only() {
        let extra = Condition::all().add(customer::Column::IsActive.eq(true));

        // Narrowing an unrestricted scope restricts it.
        let scope = Scope::Unrestricted.and(extra.clone());
        assert!(matches!(scope, Scope::Restricted(_)));

        // Narrowing a restricted scope keeps the original predicate.
        let base = Condition::all().add(customer::Column::CompanyId.eq(Uuid::new_v4()));
        let scope = Scope::Restricted(base.clone()).and(extra);
        match scope {
            Scope::Restricted(condition) => {
                assert_ne!(format!("{condition:?}"), format!("{base:?}"));
            }
            Scope::Unrestricted => panic!("AND with a condition can never widen"),
        }
    }
}
