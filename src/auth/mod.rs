//! Actor identity and the permission gate.
//!
//! Authentication and role CRUD live outside the engine; what arrives here is
//! an already-resolved [`Actor`]. The gate only answers allow/deny.

pub mod gate;

pub use gate::PermissionGate;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable dotted resource codes consumed by the permission gate.
pub mod resources {
    pub const INVENTORY_IMPORT: &str = "inventory.import";
    pub const INVENTORY_EXPORT: &str = "inventory.export";
    pub const INVENTORY_TRANSFER: &str = "inventory.transfer";
    pub const INVENTORY_BALANCE: &str = "inventory.balance";
    pub const FINANCE_DEBTS: &str = "finance.debts";
}

/// Capability set carried by an actor's role.
///
/// `Full` is the sentinel "all permissions granted" variant: the distinguished
/// full-access role bypasses the capability-matrix lookup entirely, and that
/// bypass lives in exactly one place ([`PermissionGate::check`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleAccess {
    Full,
    Role(Uuid),
}

/// Authenticated caller identity, resolved by the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: RoleAccess,
    pub branch_id: Uuid,
}

impl Actor {
    pub fn new(user_id: Uuid, role: RoleAccess, branch_id: Uuid) -> Self {
        Self {
            user_id,
            role,
            branch_id,
        }
    }

    pub fn has_full_access(&self) -> bool {
        matches!(self.role, RoleAccess::Full)
    }

    /// Branch-scope check: non-full-access actors may only act on resources
    /// owned by their own branch.
    pub fn can_act_on_branch(&self, branch_id: Uuid) -> bool {
        self.has_full_access() || self.branch_id == branch_id
    }
}

/// The four independent actions of the capability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}
