use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw material master record. Balances for materials live in warehouses of
/// kind `RAW_MATERIAL`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    /// Unit of measure, e.g. "kg", "pcs".
    pub unit: String,
    pub branch_id: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
