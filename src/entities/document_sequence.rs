use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-day document-number counter, keyed by code prefix and calendar date.
///
/// Incremented with a guarded UPDATE inside the same transaction as the
/// insert it numbers, so concurrent creates on the same day never share a
/// sequence value.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub prefix: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub seq_date: Date,
    pub last_value: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
