//! Order lifecycle state machine.
//!
//! States move `pending -> approved -> in_production -> completed`, with
//! `pending -> rejected` and any non-terminal state -> `cancelled`. The
//! transition table is pure and unit-tested; the service wraps it with the
//! mandatory permission and scope checks and commits each transition as a
//! single optimistic check-and-set guarded on the order's `version`, so
//! two concurrent transitions from the same prior state produce exactly
//! one winner and one appended history row.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix};
use crate::entities::{dispatch, order, order_item, order_status_history};
use crate::errors::ServiceError;
use crate::scope::ScopeResolver;

/// Canonical order states. Stored and serialized in snake_case; there is
/// deliberately no tolerance for legacy capitalized forms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    InProduction,
    Completed,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Orders may only be removed before work starts or after the order
    /// has been called off.
    pub fn is_deletable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }
}

/// The fixed legal-transition table.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Approved) | (Pending, Rejected) => true,
        (Approved, InProduction) => true,
        (InProduction, Completed) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

pub fn allowed_targets(from: OrderStatus) -> Vec<OrderStatus> {
    use strum::IntoEnumIterator;
    OrderStatus::iter()
        .filter(|to| is_valid_transition(from, *to))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub notes: Option<String>,
    /// Required when `target` is `rejected`.
    pub rejection_reason: Option<String>,
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    /// Apply a status transition. Authorization and visibility are
    /// independent checks: the permission matrix must grant the edit and
    /// the order must lie inside the caller's scope.
    #[instrument(skip(self, identity, request), fields(order_id = %order_id, target = %request.target))]
    pub async fn transition(
        &self,
        identity: &Identity,
        order_id: Uuid,
        request: TransitionRequest,
    ) -> Result<order::Model, ServiceError> {
        // Approving or rejecting is gated by the approval feature; every
        // other move is a plain order edit.
        let feature = match request.target {
            OrderStatus::Approved | OrderStatus::Rejected => features::APPROVAL,
            _ => features::MANAGE,
        };
        if !self
            .matrix
            .can(identity, modules::ORDERS, feature, Action::Edit)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to change order status".to_string(),
            ));
        }

        let scope = self.scopes.orders(identity).await?;
        let order = scope
            .apply(order::Entity::find_by_id(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let current = OrderStatus::from_str(&order.status).map_err(|_| {
            ServiceError::InternalError(format!(
                "order {order_id} carries unknown status '{}'",
                order.status
            ))
        })?;

        if !is_valid_transition(current, request.target) {
            return Err(ServiceError::InvalidTransition(format!(
                "'{current}' -> '{}'",
                request.target
            )));
        }

        let rejection_reason = match request.target {
            OrderStatus::Rejected => match request
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
            {
                Some(reason) => Some(reason.to_string()),
                None => return Err(ServiceError::MissingReason),
            },
            _ => None,
        };

        let now = Utc::now();
        let expected_version = order.version;

        let mut update = order::ActiveModel {
            status: Set(request.target.to_string()),
            version: Set(expected_version + 1),
            updated_at: Set(Some(now)),
            ..Default::default()
        };
        match request.target {
            OrderStatus::Approved => {
                update.approved_by = Set(Some(identity.user_id));
                update.approved_at = Set(Some(now));
            }
            OrderStatus::Completed => {
                update.completed_by = Set(Some(identity.user_id));
                update.completed_at = Set(Some(now));
            }
            OrderStatus::Rejected => {
                update.rejection_reason = Set(rejection_reason.clone());
            }
            _ => {}
        }

        let txn = self.db.begin().await?;

        // Check-and-set: the update only lands if nobody else advanced the
        // order since we read it.
        let result = order::Entity::update_many()
            .set(update)
            .filter(
                Condition::all()
                    .add(order::Column::Id.eq(order_id))
                    .add(order::Column::Version.eq(expected_version)),
            )
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ServiceError::InvalidTransition(format!(
                "order {order_id} was changed concurrently; re-read it and retry from its current status"
            )));
        }

        order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(request.target.to_string()),
            previous_status: Set(Some(current.to_string())),
            updated_by: Set(identity.user_id),
            updated_at: Set(now),
            notes: Set(request.notes.clone()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            from = %current,
            to = %request.target,
            actor = %identity.user_id,
            "order status transitioned"
        );

        let mut updated = order;
        updated.status = request.target.to_string();
        updated.version = expected_version + 1;
        updated.updated_at = Some(now);
        match request.target {
            OrderStatus::Approved => {
                updated.approved_by = Some(identity.user_id);
                updated.approved_at = Some(now);
            }
            OrderStatus::Completed => {
                updated.completed_by = Some(identity.user_id);
                updated.completed_at = Some(now);
            }
            OrderStatus::Rejected => {
                updated.rejection_reason = rejection_reason;
            }
            _ => {}
        }
        Ok(updated)
    }

    /// Delete an order, allowed only from `pending` or `cancelled`.
    #[instrument(skip(self, identity), fields(order_id = %order_id))]
    pub async fn delete_order(
        &self,
        identity: &Identity,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        if !self
            .matrix
            .can(identity, modules::ORDERS, features::MANAGE, Action::Delete)
        {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to delete orders".to_string(),
            ));
        }

        let scope = self.scopes.orders(identity).await?;
        let order = scope
            .apply(order::Entity::find_by_id(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let status = OrderStatus::from_str(&order.status).map_err(|_| {
            ServiceError::InternalError(format!(
                "order {order_id} carries unknown status '{}'",
                order.status
            ))
        })?;

        if !status.is_deletable() {
            return Err(ServiceError::IllegalDeletion(format!(
                "orders in status '{status}' cannot be deleted"
            )));
        }

        let txn = self.db.begin().await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order_status_history::Entity::delete_many()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        dispatch::Entity::delete_many()
            .filter(dispatch::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order_id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, actor = %identity.user_id, "order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use OrderStatus::*;

    #[test_case(Pending, Approved => true)]
    #[test_case(Pending, Rejected => true)]
    #[test_case(Pending, Cancelled => true)]
    #[test_case(Approved, InProduction => true)]
    #[test_case(Approved, Cancelled => true)]
    #[test_case(InProduction, Completed => true)]
    #[test_case(InProduction, Cancelled => true)]
    #[test_case(Pending, InProduction => false)]
    #[test_case(Pending, Completed => false)]
    #[test_case(Approved, Completed => false)]
    #[test_case(Approved, Rejected => false)]
    #[test_case(Completed, Cancelled => false)]
    #[test_case(Cancelled, Pending => false)]
    #[test_case(Rejected, Approved => false)]
    #[test_case(Completed, Pending => false)]
    #[test_case(Pending, Pending => false)]
    fn transition_table(from: OrderStatus, to: OrderStatus) -> bool {
        is_valid_transition(from, to)
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Completed, Cancelled, Rejected] {
            assert!(allowed_targets(terminal).is_empty());
        }
    }

    #[test]
    fn deletion_policy_matches_the_lifecycle() {
        assert!(Pending.is_deletable());
        assert!(Cancelled.is_deletable());
        assert!(!Approved.is_deletable());
        assert!(!InProduction.is_deletable());
        assert!(!Completed.is_deletable());
        assert!(!Rejected.is_deletable());
    }

    #[test]
    fn statuses_serialize_in_snake_case() {
        assert_eq!(InProduction.to_string(), "in_production");
        assert_eq!(
            OrderStatus::from_str("in_production").unwrap(),
            InProduction
        );
        // No dual-case support is carried forward.
        assert!(OrderStatus::from_str("Pending").is_err());
    }
}
