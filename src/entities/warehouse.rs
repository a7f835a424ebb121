use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::stock_balance::ItemKind;

/// Fixes which item class a warehouse's balances refer to. Immutable after
/// creation: movements assume a warehouse only ever holds one item class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum WarehouseKind {
    #[sea_orm(string_value = "RAW_MATERIAL")]
    RawMaterial,
    #[sea_orm(string_value = "FINISHED_GOOD")]
    FinishedGood,
}

impl WarehouseKind {
    /// The item class this warehouse kind holds balances for.
    pub fn item_kind(self) -> ItemKind {
        match self {
            WarehouseKind::RawMaterial => ItemKind::Material,
            WarehouseKind::FinishedGood => ItemKind::Product,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub branch_id: Uuid,
    pub kind: WarehouseKind,
    /// Deactivated warehouses reject new movements; rows with balances are
    /// never hard-deleted.
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_balance::Entity")]
    StockBalance,
}

impl Related<super::stock_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBalance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
