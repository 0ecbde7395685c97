//! Campaign entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Campaign status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CampaignStatus {
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    #[sea_orm(string_value = "finalized")]
    Finalized,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Campaign model. A contest made of a sequence of rounds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    /// Start of the upload window used by date-based disqualification.
    #[sea_orm(nullable)]
    pub open_date: Option<DateTimeWithTimeZone>,

    /// End of the upload window used by date-based disqualification.
    #[sea_orm(nullable)]
    pub close_date: Option<DateTimeWithTimeZone>,

    pub status: CampaignStatus,

    /// The round currently being judged, if any.
    #[sea_orm(nullable)]
    pub active_round_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::round::Entity")]
    Round,
    #[sea_orm(has_many = "super::campaign_coord::Entity")]
    CampaignCoord,
}

impl Related<super::round::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Round.def()
    }
}

impl Related<super::campaign_coord::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignCoord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
