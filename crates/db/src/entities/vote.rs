//! Vote entity. The value recorded for a completed task.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// One vote per task; resubmission overwrites in place.
    #[sea_orm(unique)]
    pub task_id: String,

    #[sea_orm(indexed)]
    pub round_id: String,

    #[sea_orm(indexed)]
    pub round_entry_id: String,

    pub user_id: String,

    /// Rating (0.0..=1.0), yes/no (0.0 or 1.0), or rank (0-based).
    pub value: f64,

    /// Optional free-text review.
    #[sea_orm(nullable)]
    pub review: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task::Entity",
        from = "Column::TaskId",
        to = "super::task::Column::Id",
        on_delete = "Cascade"
    )]
    Task,

    #[sea_orm(
        belongs_to = "super::round_entry::Entity",
        from = "Column::RoundEntryId",
        to = "super::round_entry::Column::Id",
        on_delete = "Cascade"
    )]
    RoundEntry,
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl Related<super::round_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
