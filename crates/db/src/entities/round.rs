//! Round entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How jurors vote in a round. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum VoteMethod {
    /// Five-point scale, 0.0 to 1.0 in quarter steps.
    #[sea_orm(string_value = "rating")]
    Rating,
    /// Binary approval, 0.0 or 1.0.
    #[sea_orm(string_value = "yesno")]
    YesNo,
    /// Each juror orders their whole assignment; lower is better.
    #[sea_orm(string_value = "ranking")]
    Ranking,
}

impl VoteMethod {
    /// Wire name of the vote method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::YesNo => "yesno",
            Self::Ranking => "ranking",
        }
    }
}

/// Round status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RoundStatus {
    #[sea_orm(string_value = "draft")]
    #[default]
    Draft,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "finalized")]
    Finalized,
}

impl RoundStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Finalized => "finalized",
        }
    }

    /// Whether the round has tasks that are being worked on or held.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// Whether no further transitions are possible (except unfinalize).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Finalized)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "round")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub campaign_id: String,

    pub name: String,

    /// Instructions shown to jurors.
    #[sea_orm(nullable)]
    pub directions: Option<String>,

    pub vote_method: VoteMethod,

    /// Number of independent votes required per entry.
    pub quorum: i32,

    pub status: RoundStatus,

    #[sea_orm(nullable)]
    pub deadline: Option<DateTimeWithTimeZone>,

    /// Serialized round configuration (disqualification and display flags).
    #[sea_orm(column_type = "Json")]
    pub config: JsonValue,

    /// Roster or quorum changed while paused; resume must rebalance.
    pub rebalance_pending: bool,

    /// Threshold chosen when a rating round was finalized.
    #[sea_orm(nullable)]
    pub final_threshold: Option<f64>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub activated_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub closed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id",
        on_delete = "Cascade"
    )]
    Campaign,
    #[sea_orm(has_many = "super::round_juror::Entity")]
    RoundJuror,
    #[sea_orm(has_many = "super::round_entry::Entity")]
    RoundEntry,
    #[sea_orm(has_many = "super::task::Entity")]
    Task,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::round_juror::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundJuror.def()
    }
}

impl Related<super::round_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoundEntry.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
