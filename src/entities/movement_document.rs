use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of an inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MovementDirection {
    #[sea_orm(string_value = "IN")]
    In,
    #[sea_orm(string_value = "OUT")]
    Out,
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
}

impl MovementDirection {
    /// Document-code prefix, e.g. `MI2601150001`.
    pub fn code_prefix(self) -> &'static str {
        match self {
            MovementDirection::In => "MI",
            MovementDirection::Out => "MO",
            MovementDirection::Transfer => "MT",
        }
    }

    /// Permission resource consumed by this direction's operations.
    pub fn resource_code(self) -> &'static str {
        match self {
            MovementDirection::In => crate::auth::resources::INVENTORY_IMPORT,
            MovementDirection::Out => crate::auth::resources::INVENTORY_EXPORT,
            MovementDirection::Transfer => crate::auth::resources::INVENTORY_TRANSFER,
        }
    }
}

/// Approval state of a movement document. `Approved` and `Rejected` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MovementState {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

/// An inventory transaction request that passes through an approval workflow
/// before affecting balances.
///
/// `IN` documents populate `dest_warehouse_id`, `OUT` documents
/// `source_warehouse_id`, `TRANSFER` documents both.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movement_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable sequential code: `{prefix}{YYMMDD}{seq:04}`.
    #[sea_orm(unique)]
    pub code: String,
    pub direction: MovementDirection,
    pub state: MovementState,
    pub source_warehouse_id: Option<Uuid>,
    pub dest_warehouse_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub approved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movement_line::Entity")]
    MovementLine,
}

impl Related<super::movement_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovementLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
