//! Flag entity. A juror's concern about an entry, for coordinator review.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flag")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub round_id: String,

    #[sea_orm(indexed)]
    pub round_entry_id: String,

    pub user_id: String,

    #[sea_orm(nullable)]
    pub reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::round_entry::Entity",
        from = "Column::RoundEntryId",
        to = "super::round_entry::Column::Id",
        on_delete = "Cascade"
    )]
    RoundEntry,
}

impl Related<super::round_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
