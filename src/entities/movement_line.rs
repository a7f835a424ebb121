use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::stock_balance::ItemKind;

/// One item line of a movement document. Immutable once the parent document
/// leaves `PENDING`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movement_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub document_id: Uuid,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    /// Required for `IN` documents, optional otherwise.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub unit_price: Option<Decimal>,
    /// quantity × unit_price, when a price is present.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub amount: Option<Decimal>,
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
