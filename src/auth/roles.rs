use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Fixed role enumeration. The snake_case string form is what goes into
/// tokens and the `users.role` column.
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
pub enum Role {
    SuperAdmin,
    UnitHead,
    UnitManager,
    Sales,
    Production,
    Packing,
    Dispatch,
    Accounts,
}

impl Role {
    pub fn is_super_admin(self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Every role except super_admin only ever sees its own company's data.
    pub fn is_company_scoped(self) -> bool {
        !self.is_super_admin()
    }

    /// Roles whose users can own orders as salesperson. The order scope
    /// resolver joins through exactly this set.
    pub fn order_owning() -> &'static [Role] {
        &[Role::Sales, Role::UnitManager, Role::UnitHead]
    }

    /// Roles bound to a single manufacturing unit; listings for
    /// unit-carrying resources are narrowed to that unit.
    pub fn is_unit_bound(self) -> bool {
        matches!(self, Role::Production | Role::Packing | Role::Dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn string_forms_round_trip() {
        assert_eq!(Role::SuperAdmin.to_string(), "super_admin");
        assert_eq!(Role::UnitHead.to_string(), "unit_head");
        assert_eq!(Role::from_str("in_valid").ok(), None);
        assert_eq!(Role::from_str("sales").unwrap(), Role::Sales);
        assert_eq!(Role::from_str("unit_manager").unwrap(), Role::UnitManager);
    }

    #[test]
    fn only_super_admin_is_unscoped() {
        use strum::IntoEnumIterator;
        for role in Role::iter() {
            assert_eq!(role.is_company_scoped(), role != Role::SuperAdmin);
        }
    }
}
