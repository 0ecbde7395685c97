//! Entry entity. An immutable contest submission shared across rounds.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// File name, unique across the store.
    #[sea_orm(unique)]
    pub name: String,

    pub width: i32,

    pub height: i32,

    /// Full MIME type, e.g. `image/jpeg`.
    pub mime_type: String,

    /// User name of the uploader.
    pub upload_user_text: String,

    #[sea_orm(nullable)]
    pub upload_date: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Resolution in pixels.
    #[must_use]
    pub const fn resolution(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::round_entry::Entity")]
    RoundEntry,
}

impl Related<super::round_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
