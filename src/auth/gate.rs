use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::auth::{Action, Actor, RoleAccess};
use crate::entities::permission_grant::{self, Entity as PermissionGrant};
use crate::errors::ServiceError;

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// The single entry point for authorization decisions.
///
/// Must be consulted, and must allow, before any state-mutating operation
/// opens a transaction; a deny therefore produces zero writes.
#[derive(Clone)]
pub struct PermissionGate {
    db: Arc<DatabaseConnection>,
}

impl PermissionGate {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves `(actor, resource, action)` to a decision.
    ///
    /// The full-access role short-circuits to `Allow` with no datastore
    /// read. Everyone else is resolved against the capability matrix; a
    /// missing row denies every action.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        actor: &Actor,
        resource: &str,
        action: Action,
    ) -> Result<Decision, ServiceError> {
        let role_id = match actor.role {
            RoleAccess::Full => return Ok(Decision::Allow),
            RoleAccess::Role(id) => id,
        };

        let grant = PermissionGrant::find()
            .filter(permission_grant::Column::RoleId.eq(role_id))
            .filter(permission_grant::Column::Resource.eq(resource))
            .one(&*self.db)
            .await?;

        let allowed = match grant {
            Some(row) => match action {
                Action::View => row.can_view,
                Action::Create => row.can_create,
                Action::Edit => row.can_edit,
                Action::Delete => row.can_delete,
            },
            None => false,
        };

        if allowed {
            debug!(user_id = %actor.user_id, resource, action = action.as_str(), "Permission granted");
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny)
        }
    }

    /// Like [`check`](Self::check), but turns a deny into
    /// `ServiceError::Unauthorized` and logs it with the actor identity.
    pub async fn authorize(
        &self,
        actor: &Actor,
        resource: &str,
        action: Action,
    ) -> Result<(), ServiceError> {
        match self.check(actor, resource, action).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(
                    user_id = %actor.user_id,
                    branch_id = %actor.branch_id,
                    resource,
                    action = action.as_str(),
                    "Authorization denied"
                );
                Err(ServiceError::Unauthorized(format!(
                    "not permitted to {} {}",
                    action.as_str(),
                    resource
                )))
            }
        }
    }
}
