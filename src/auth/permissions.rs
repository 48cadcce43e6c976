//! Permission Matrix: a static `(role, module, feature) -> capability`
//! table consulted before every mutation.
//!
//! The matrix is data, not control flow. The built-in grants below are the
//! shipped defaults; an operator can replace the whole table at startup
//! from a grants document without touching scope or transition logic.
//! Missing entries always deny.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::{Identity, Role};

/// Module name constants used as matrix keys.
pub mod modules {
    pub const ORDERS: &str = "orders";
    pub const CUSTOMERS: &str = "customers";
    pub const INVENTORY: &str = "inventory";
    pub const DISPATCHES: &str = "dispatches";
    pub const REPORTS: &str = "reports";
    pub const USERS: &str = "users";
}

/// Feature keys within a module.
pub mod features {
    /// Day-to-day CRUD on the module's records.
    pub const MANAGE: &str = "manage";
    /// Approving or rejecting pending orders; gated separately from
    /// general order edits.
    pub const APPROVAL: &str = "approval";
    /// Aggregated dashboard reads.
    pub const DASHBOARDS: &str = "dashboards";
}

/// CRUD-style actions a capability entry can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Add,
    Edit,
    Delete,
}

/// Capability flags for one `(role, module, feature)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub view: bool,
    pub add: bool,
    pub edit: bool,
    pub delete: bool,
}

impl Capabilities {
    pub const fn new(view: bool, add: bool, edit: bool, delete: bool) -> Self {
        Self {
            view,
            add,
            edit,
            delete,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true, true)
    }

    pub const fn view_only() -> Self {
        Self::new(true, false, false, false)
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Add => self.add,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }
}

const fn caps(view: bool, add: bool, edit: bool, delete: bool) -> Capabilities {
    Capabilities::new(view, add, edit, delete)
}

/// Shipped default grants. SuperAdmin is intentionally absent: it passes
/// every check implicitly and never consults the table.
#[rustfmt::skip]
const DEFAULT_GRANTS: &[(Role, &str, &str, Capabilities)] = &[
    // Unit head: full control of the company's sales operation.
    (Role::UnitHead,    modules::ORDERS,     features::MANAGE,     Capabilities::full()),
    (Role::UnitHead,    modules::ORDERS,     features::APPROVAL,   caps(true, false, true, false)),
    (Role::UnitHead,    modules::CUSTOMERS,  features::MANAGE,     Capabilities::full()),
    (Role::UnitHead,    modules::INVENTORY,  features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitHead,    modules::DISPATCHES, features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitHead,    modules::REPORTS,    features::DASHBOARDS, Capabilities::view_only()),
    (Role::UnitHead,    modules::USERS,      features::MANAGE,     Capabilities::view_only()),

    // Unit manager: everything but deletion and user administration.
    (Role::UnitManager, modules::ORDERS,     features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitManager, modules::ORDERS,     features::APPROVAL,   caps(true, false, true, false)),
    (Role::UnitManager, modules::CUSTOMERS,  features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitManager, modules::INVENTORY,  features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitManager, modules::DISPATCHES, features::MANAGE,     caps(true, true, true, false)),
    (Role::UnitManager, modules::REPORTS,    features::DASHBOARDS, Capabilities::view_only()),

    // Sales: owns orders and customers, no approval authority.
    (Role::Sales,       modules::ORDERS,     features::MANAGE,     caps(true, true, true, false)),
    (Role::Sales,       modules::CUSTOMERS,  features::MANAGE,     caps(true, true, true, false)),
    (Role::Sales,       modules::REPORTS,    features::DASHBOARDS, Capabilities::view_only()),

    // Shop-floor roles.
    (Role::Production,  modules::ORDERS,     features::MANAGE,     caps(true, false, true, false)),
    (Role::Production,  modules::INVENTORY,  features::MANAGE,     caps(true, false, true, false)),
    (Role::Packing,     modules::ORDERS,     features::MANAGE,     Capabilities::view_only()),
    (Role::Packing,     modules::INVENTORY,  features::MANAGE,     Capabilities::view_only()),
    (Role::Packing,     modules::DISPATCHES, features::MANAGE,     Capabilities::view_only()),
    (Role::Dispatch,    modules::ORDERS,     features::MANAGE,     Capabilities::view_only()),
    (Role::Dispatch,    modules::DISPATCHES, features::MANAGE,     caps(true, true, true, false)),

    // Accounts: read-only across the company.
    (Role::Accounts,    modules::ORDERS,     features::MANAGE,     Capabilities::view_only()),
    (Role::Accounts,    modules::CUSTOMERS,  features::MANAGE,     Capabilities::view_only()),
    (Role::Accounts,    modules::INVENTORY,  features::MANAGE,     Capabilities::view_only()),
    (Role::Accounts,    modules::REPORTS,    features::DASHBOARDS, Capabilities::view_only()),
];

/// One grant row in a replacement document (TOML/JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantSpec {
    pub role: String,
    pub module: String,
    pub feature: String,
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub add: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
}

/// Immutable role/module/feature capability table, versioned so operators
/// can tell which grant set a process is running with.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    version: String,
    grants: HashMap<(Role, String, String), Capabilities>,
}

impl PermissionMatrix {
    /// The shipped defaults.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Build a matrix from a grants document, replacing the defaults
    /// wholesale. Unknown role names are a configuration error.
    pub fn from_grants(
        version: impl Into<String>,
        grants: Vec<GrantSpec>,
    ) -> Result<Self, String> {
        let mut table = HashMap::with_capacity(grants.len());
        for grant in grants {
            let role = Role::from_str(&grant.role)
                .map_err(|_| format!("unknown role '{}' in grants document", grant.role))?;
            table.insert(
                (role, grant.module, grant.feature),
                Capabilities::new(grant.view, grant.add, grant.edit, grant.delete),
            );
        }
        Ok(Self {
            version: version.into(),
            grants: table,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Capability lookup. SuperAdmin implicitly passes every check; for
    /// everyone else a missing entry means deny. Deactivated identities
    /// are denied everything regardless of role.
    pub fn can(&self, identity: &Identity, module: &str, feature: &str, action: Action) -> bool {
        if !identity.is_active {
            return false;
        }
        if identity.role.is_super_admin() {
            return true;
        }
        self.grants
            .get(&(identity.role, module.to_string(), feature.to_string()))
            .map(|capabilities| capabilities.allows(action))
            .unwrap_or(false)
    }
}

lazy_static! {
    static ref BUILTIN: PermissionMatrix = {
        let mut grants = HashMap::with_capacity(DEFAULT_GRANTS.len());
        for (role, module, feature, capabilities) in DEFAULT_GRANTS {
            grants.insert(
                (*role, module.to_string(), feature.to_string()),
                *capabilities,
            );
        }
        PermissionMatrix {
            version: "builtin-v1".to_string(),
            grants,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(role: Role, active: bool) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
            company_id: Some(Uuid::new_v4()),
            unit: None,
            is_active: active,
        }
    }

    #[test]
    fn super_admin_passes_every_check() {
        let matrix = PermissionMatrix::builtin();
        let admin = identity(Role::SuperAdmin, true);
        assert!(matrix.can(&admin, modules::ORDERS, features::MANAGE, Action::Delete));
        assert!(matrix.can(&admin, "nonexistent", "nonexistent", Action::Edit));
    }

    #[test]
    fn missing_entries_deny() {
        let matrix = PermissionMatrix::builtin();
        let packing = identity(Role::Packing, true);
        // Packing has no customers entry at all.
        assert!(!matrix.can(&packing, modules::CUSTOMERS, features::MANAGE, Action::View));
        // And no approval authority.
        assert!(!matrix.can(&packing, modules::ORDERS, features::APPROVAL, Action::Edit));
    }

    #[test]
    fn capabilities_are_per_action() {
        let matrix = PermissionMatrix::builtin();
        let sales = identity(Role::Sales, true);
        assert!(matrix.can(&sales, modules::ORDERS, features::MANAGE, Action::Add));
        assert!(!matrix.can(&sales, modules::ORDERS, features::MANAGE, Action::Delete));
        assert!(!matrix.can(&sales, modules::ORDERS, features::APPROVAL, Action::Edit));
    }

    #[test]
    fn deactivated_identities_are_denied_everything() {
        let matrix = PermissionMatrix::builtin();
        let head = identity(Role::UnitHead, false);
        assert!(!matrix.can(&head, modules::ORDERS, features::MANAGE, Action::View));

        let admin = identity(Role::SuperAdmin, false);
        assert!(!matrix.can(&admin, modules::ORDERS, features::MANAGE, Action::View));
    }

    #[test]
    fn grants_documents_replace_the_table_wholesale() {
        let matrix = PermissionMatrix::from_grants(
            "custom-v2",
            vec![GrantSpec {
                role: "packing".into(),
                module: modules::CUSTOMERS.into(),
                feature: features::MANAGE.into(),
                view: true,
                add: false,
                edit: false,
                delete: false,
            }],
        )
        .unwrap();

        assert_eq!(matrix.version(), "custom-v2");
        let packing = identity(Role::Packing, true);
        assert!(matrix.can(&packing, modules::CUSTOMERS, features::MANAGE, Action::View));
        // Default grants are gone: replaced, not merged.
        let head = identity(Role::UnitHead, true);
        assert!(!matrix.can(&head, modules::ORDERS, features::MANAGE, Action::View));
    }

    #[test]
    fn unknown_roles_in_grants_documents_error() {
        let result = PermissionMatrix::from_grants(
            "bad",
            vec![GrantSpec {
                role: "warehouse_wizard".into(),
                module: modules::ORDERS.into(),
                feature: features::MANAGE.into(),
                view: true,
                add: false,
                edit: false,
                delete: false,
            }],
        );
        assert!(result.is_err());
    }
}
