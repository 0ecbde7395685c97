//! Task entity. One (round entry, juror) review assignment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub round_id: String,

    #[sea_orm(indexed)]
    pub round_entry_id: String,

    /// Juror the task is assigned to.
    #[sea_orm(indexed)]
    pub user_id: String,

    pub created_at: DateTimeWithTimeZone,

    /// Set once a vote has been recorded.
    #[sea_orm(nullable)]
    pub complete_date: Option<DateTimeWithTimeZone>,

    /// Set when the task is withdrawn. Cancelled tasks are never reopened.
    #[sea_orm(nullable)]
    pub cancel_date: Option<DateTimeWithTimeZone>,

    /// Last time the juror skipped the task.
    #[sea_orm(nullable)]
    pub skipped_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Not cancelled. Active tasks count toward quorum.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cancel_date.is_none()
    }

    /// Active and not yet voted on.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.cancel_date.is_none() && self.complete_date.is_none()
    }

    /// Active and voted on.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.cancel_date.is_none() && self.complete_date.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::round::Entity",
        from = "Column::RoundId",
        to = "super::round::Column::Id",
        on_delete = "Cascade"
    )]
    Round,

    #[sea_orm(
        belongs_to = "super::round_entry::Entity",
        from = "Column::RoundEntryId",
        to = "super::round_entry::Column::Id",
        on_delete = "Cascade"
    )]
    RoundEntry,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_one = "super::vote::Entity")]
    Vote,
}

impl Related<super::round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Round.def()
    }
}

impl Related<super::round_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundEntry.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
