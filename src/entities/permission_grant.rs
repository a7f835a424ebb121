use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Capability-matrix row: what one role may do with one resource.
///
/// Absence of a row means every action is denied for that (role, resource)
/// pair. The full-access role never reaches this table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permission_grants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub role_id: Uuid,
    /// Stable dotted resource code, e.g. `inventory.export`.
    pub resource: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
