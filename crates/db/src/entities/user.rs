//! User entity.
//!
//! Users are authenticated identities handed to the core by the auth layer.
//! Roles stored here only feed authorization checks and the
//! disqualify-by-uploader rule.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique user name, matched against entry uploader names.
    #[sea_orm(unique)]
    pub username: String,

    /// Organizers may create campaigns.
    pub is_organizer: bool,

    /// Maintainers may do anything.
    pub is_maintainer: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::round_juror::Entity")]
    RoundJuror,
    #[sea_orm(has_many = "super::task::Entity")]
    Task,
}

impl Related<super::round_juror::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundJuror.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
