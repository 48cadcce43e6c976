//! Aggregation/reporting engine for dashboards.
//!
//! Every summary starts from the caller's scope predicate — a report can
//! never aggregate data outside the caller's tenant — and the folding is
//! done in parameterized functions with a fixed input shape, so the same
//! code serves every endpoint instead of per-handler pipeline literals.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{features, modules, Action, Identity, PermissionMatrix, Role};
use crate::entities::{company, order, user};
use crate::errors::ServiceError;
use crate::scope::ScopeResolver;
use crate::services::order_status::OrderStatus;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusBucket {
    pub status: OrderStatus,
    pub count: u64,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusSummary {
    pub buckets: Vec<StatusBucket>,
    pub total_orders: u64,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesPersonStats {
    pub sales_person_id: Uuid,
    pub display_name: String,
    pub order_count: u64,
    pub revenue: Decimal,
    pub unique_customers: u64,
    pub last_order_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendBucket {
    Day,
    Week,
}

impl Default for TrendBucket {
    fn default() -> Self {
        TrendBucket::Day
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TrendParams {
    /// Window length in days, ending today.
    #[serde(default = "default_trend_days")]
    pub days: u32,
    #[serde(default)]
    pub bucket: TrendBucket,
}

fn default_trend_days() -> u32 {
    30
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub order_count: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderTrend {
    pub bucket: TrendBucket,
    /// Zero-filled series: one point per day (or week) of the window,
    /// whether or not anything happened then.
    pub points: Vec<TrendPoint>,
    pub current_orders: u64,
    pub previous_orders: u64,
    pub current_revenue: Decimal,
    pub previous_revenue: Decimal,
    pub order_growth_pct: f64,
    pub revenue_growth_pct: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompanyOrderCount {
    pub company_id: Uuid,
    pub company_name: String,
    pub order_count: u64,
    pub total_amount: Decimal,
}

/// Growth as a percentage, with the deliberate `previous == 0 -> 0`
/// policy: a series starting from nothing reports no growth rather than
/// infinity.
pub fn growth_pct(current: Decimal, previous: Decimal) -> f64 {
    if previous.is_zero() {
        return 0.0;
    }
    ((current - previous) / previous * Decimal::from(100))
        .to_f64()
        .unwrap_or(0.0)
}

/// Fold per-day totals into a series of exactly `days` points starting at
/// `start`, zero-filling quiet days.
pub fn zero_filled_days(
    start: NaiveDate,
    days: u32,
    totals: &HashMap<NaiveDate, (u64, Decimal)>,
) -> Vec<TrendPoint> {
    (0..days)
        .map(|offset| {
            let date = start + Duration::days(offset as i64);
            let (order_count, revenue) = totals.get(&date).copied().unwrap_or((0, Decimal::ZERO));
            TrendPoint {
                period_start: date,
                order_count,
                revenue,
            }
        })
        .collect()
}

/// Collapse a zero-filled day series into ISO-week points. The week
/// containing the first day starts the series; partial edge weeks keep
/// their own point, so the series still covers the whole window.
pub fn collapse_to_weeks(days: Vec<TrendPoint>) -> Vec<TrendPoint> {
    let mut weeks: Vec<TrendPoint> = Vec::new();
    let mut current_week: Option<(i32, u32)> = None;

    for point in days {
        let iso = point.period_start.iso_week();
        let key = (iso.year(), iso.week());
        match current_week {
            Some(existing) if existing == key => {
                let last = weeks.last_mut().expect("week bucket exists");
                last.order_count += point.order_count;
                last.revenue += point.revenue;
            }
            _ => {
                current_week = Some(key);
                weeks.push(point);
            }
        }
    }
    weeks
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    matrix: Arc<PermissionMatrix>,
    scopes: ScopeResolver,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, matrix: Arc<PermissionMatrix>) -> Self {
        let scopes = ScopeResolver::new(db.clone());
        Self { db, matrix, scopes }
    }

    fn require_dashboards(&self, identity: &Identity) -> Result<(), ServiceError> {
        if !self.matrix.can(
            identity,
            modules::REPORTS,
            features::DASHBOARDS,
            Action::View,
        ) {
            return Err(ServiceError::Forbidden(
                "Insufficient permissions to read reports".to_string(),
            ));
        }
        Ok(())
    }

    async fn scoped_orders(
        &self,
        identity: &Identity,
        range: &ReportRange,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut filters = Condition::all();
        if let Some(from) = range.from {
            filters = filters.add(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = range.to {
            filters = filters.add(order::Column::CreatedAt.lte(to));
        }

        let scope = self.scopes.orders(identity).await?.and(filters);
        Ok(scope.apply(order::Entity::find()).all(&*self.db).await?)
    }

    /// Per-status counts and totals over the caller's scoped order set.
    #[instrument(skip(self, identity, range))]
    pub async fn status_summary(
        &self,
        identity: &Identity,
        range: ReportRange,
    ) -> Result<StatusSummary, ServiceError> {
        self.require_dashboards(identity)?;
        let orders = self.scoped_orders(identity, &range).await?;

        let mut by_status: HashMap<OrderStatus, (u64, Decimal)> = HashMap::new();
        for order in &orders {
            let status = OrderStatus::from_str(&order.status).map_err(|_| {
                ServiceError::InternalError(format!(
                    "order {} carries unknown status '{}'",
                    order.id, order.status
                ))
            })?;
            let entry = by_status.entry(status).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += order.total_amount;
        }

        use strum::IntoEnumIterator;
        let buckets: Vec<StatusBucket> = OrderStatus::iter()
            .filter_map(|status| {
                by_status.get(&status).map(|(count, total)| StatusBucket {
                    status,
                    count: *count,
                    total_amount: *total,
                })
            })
            .collect();

        let total_orders = orders.len() as u64;
        let total_amount = orders.iter().map(|o| o.total_amount).sum();

        Ok(StatusSummary {
            buckets,
            total_orders,
            total_amount,
        })
    }

    /// Per-salesperson order count, revenue, unique-customer count and
    /// last-order date, for the caller's scope.
    #[instrument(skip(self, identity, range))]
    pub async fn sales_person_summary(
        &self,
        identity: &Identity,
        range: ReportRange,
    ) -> Result<Vec<SalesPersonStats>, ServiceError> {
        self.require_dashboards(identity)?;
        let orders = self.scoped_orders(identity, &range).await?;

        struct Acc {
            order_count: u64,
            revenue: Decimal,
            customers: HashSet<Uuid>,
            last_order_at: Option<DateTime<Utc>>,
        }

        let mut by_sales_person: HashMap<Uuid, Acc> = HashMap::new();
        for order in &orders {
            let acc = by_sales_person
                .entry(order.sales_person_id)
                .or_insert(Acc {
                    order_count: 0,
                    revenue: Decimal::ZERO,
                    customers: HashSet::new(),
                    last_order_at: None,
                });
            acc.order_count += 1;
            acc.revenue += order.total_amount;
            acc.customers.insert(order.customer_id);
            if acc.last_order_at.map_or(true, |seen| order.created_at > seen) {
                acc.last_order_at = Some(order.created_at);
            }
        }

        let ids: Vec<Uuid> = by_sales_person.keys().copied().collect();
        let names: HashMap<Uuid, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name))
            .collect();

        let mut rows: Vec<SalesPersonStats> = by_sales_person
            .into_iter()
            .map(|(sales_person_id, acc)| SalesPersonStats {
                sales_person_id,
                display_name: names
                    .get(&sales_person_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                order_count: acc.order_count,
                revenue: acc.revenue,
                unique_customers: acc.customers.len() as u64,
                last_order_at: acc.last_order_at,
            })
            .collect();

        rows.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        Ok(rows)
    }

    /// Zero-filled activity series over the trailing window, with growth
    /// against the window immediately before it.
    #[instrument(skip(self, identity, params))]
    pub async fn order_trend(
        &self,
        identity: &Identity,
        params: TrendParams,
    ) -> Result<OrderTrend, ServiceError> {
        self.require_dashboards(identity)?;

        let days = params.days.clamp(1, 366);
        let today = Utc::now().date_naive();
        let current_start = today - Duration::days(days as i64 - 1);
        let previous_start = current_start - Duration::days(days as i64);

        // One scoped fetch covers both windows.
        let window_start = previous_start
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let range = ReportRange {
            from: Some(window_start),
            to: None,
        };
        let orders = self.scoped_orders(identity, &range).await?;

        let mut current_totals: HashMap<NaiveDate, (u64, Decimal)> = HashMap::new();
        let mut previous_orders = 0u64;
        let mut previous_revenue = Decimal::ZERO;

        for order in &orders {
            let date = order.created_at.date_naive();
            if date >= current_start {
                let entry = current_totals.entry(date).or_insert((0, Decimal::ZERO));
                entry.0 += 1;
                entry.1 += order.total_amount;
            } else {
                previous_orders += 1;
                previous_revenue += order.total_amount;
            }
        }

        let day_points = zero_filled_days(current_start, days, &current_totals);
        let current_orders: u64 = day_points.iter().map(|p| p.order_count).sum();
        let current_revenue: Decimal = day_points.iter().map(|p| p.revenue).sum();

        let points = match params.bucket {
            TrendBucket::Day => day_points,
            TrendBucket::Week => collapse_to_weeks(day_points),
        };

        Ok(OrderTrend {
            bucket: params.bucket,
            points,
            current_orders,
            previous_orders,
            current_revenue,
            previous_revenue,
            order_growth_pct: growth_pct(
                Decimal::from(current_orders),
                Decimal::from(previous_orders),
            ),
            revenue_growth_pct: growth_pct(current_revenue, previous_revenue),
        })
    }

    /// Orders per company, reusing the salesperson indirection. Only the
    /// unscoped role may ask for a cross-tenant roll-up.
    #[instrument(skip(self, identity))]
    pub async fn company_order_counts(
        &self,
        identity: &Identity,
    ) -> Result<Vec<CompanyOrderCount>, ServiceError> {
        if !identity.is_super_admin() {
            return Err(ServiceError::Forbidden(
                "Cross-company reports are restricted to super admins".to_string(),
            ));
        }

        let roles: Vec<String> = Role::order_owning()
            .iter()
            .map(|role| role.to_string())
            .collect();
        let user_company: HashMap<Uuid, Uuid> = user::Entity::find()
            .filter(user::Column::Role.is_in(roles))
            .all(&*self.db)
            .await?
            .into_iter()
            .filter_map(|u| u.company_id.map(|company_id| (u.id, company_id)))
            .collect();

        let mut by_company: HashMap<Uuid, (u64, Decimal)> = HashMap::new();
        for order in order::Entity::find().all(&*self.db).await? {
            match user_company.get(&order.sales_person_id) {
                Some(company_id) => {
                    let entry = by_company.entry(*company_id).or_insert((0, Decimal::ZERO));
                    entry.0 += 1;
                    entry.1 += order.total_amount;
                }
                None => {
                    warn!(
                        order_id = %order.id,
                        sales_person_id = %order.sales_person_id,
                        "order's salesperson resolves to no company; excluded from roll-up"
                    );
                }
            }
        }

        let names: HashMap<Uuid, String> = company::Entity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut rows: Vec<CompanyOrderCount> = by_company
            .into_iter()
            .map(|(company_id, (order_count, total_amount))| CompanyOrderCount {
                company_id,
                company_name: names
                    .get(&company_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                order_count,
                total_amount,
            })
            .collect();

        rows.sort_by(|a, b| b.order_count.cmp(&a.order_count));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn growth_is_zero_when_previous_is_zero() {
        assert_eq!(growth_pct(dec!(42), Decimal::ZERO), 0.0);
        assert_eq!(growth_pct(Decimal::ZERO, Decimal::ZERO), 0.0);
    }

    #[test]
    fn growth_is_finite_and_signed() {
        assert_eq!(growth_pct(dec!(150), dec!(100)), 50.0);
        assert_eq!(growth_pct(dec!(50), dec!(100)), -50.0);
        assert!(growth_pct(dec!(1), dec!(3)).is_finite());
    }

    #[test]
    fn day_series_has_fixed_length_and_zero_fills() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut totals = HashMap::new();
        totals.insert(start + Duration::days(2), (3u64, dec!(90)));

        let points = zero_filled_days(start, 7, &totals);
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].order_count, 0);
        assert_eq!(points[0].revenue, Decimal::ZERO);
        assert_eq!(points[2].order_count, 3);
        assert_eq!(points[2].revenue, dec!(90));
        assert_eq!(points[6].order_count, 0);
    }

    #[test]
    fn week_collapse_preserves_totals() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(); // a Monday
        let mut totals = HashMap::new();
        totals.insert(start, (1u64, dec!(10)));
        totals.insert(start + Duration::days(6), (2u64, dec!(20)));
        totals.insert(start + Duration::days(7), (4u64, dec!(40)));

        let days = zero_filled_days(start, 14, &totals);
        let weeks = collapse_to_weeks(days);

        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].order_count, 3);
        assert_eq!(weeks[0].revenue, dec!(30));
        assert_eq!(weeks[1].order_count, 4);
        assert_eq!(weeks[1].revenue, dec!(40));
    }
}
