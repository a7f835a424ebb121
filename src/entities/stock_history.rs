use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::movement_document::MovementDirection;
use super::stock_balance::ItemKind;

/// Append-only audit fact: one row per applied movement line per affected
/// warehouse. Never updated or deleted; the source for statistics and
/// reports.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    /// `In` or `Out` relative to the warehouse on this row; a transfer line
    /// produces an `Out` row at the source and an `In` row at the
    /// destination.
    pub direction: MovementDirection,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    pub document_id: Uuid,
    pub actor_id: Uuid,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::movement_document::Entity",
        from = "Column::DocumentId",
        to = "super::movement_document::Column::Id"
    )]
    MovementDocument,
}

impl Related<super::movement_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovementDocument.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
