//! Campaign service.

use std::sync::Arc;

use chrono::Utc;
use jury_common::{AppError, AppResult, IdGenerator};
use jury_db::{
    db_err,
    entities::{
        campaign::{self, CampaignStatus},
        campaign_coord, round, user,
    },
    repositories::{CampaignRepository, RoundRepository, UserRepository},
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::{
    Actor,
    access::{require_coordinator, require_maintainer, require_organizer},
    round::cancel_round_in,
};

/// Input for creating a campaign.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCampaignInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub open_date: Option<DateTimeWithTimeZone>,
    pub close_date: Option<DateTimeWithTimeZone>,
}

/// Input for editing a campaign. Missing fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EditCampaignInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub open_date: Option<Option<DateTimeWithTimeZone>>,
    pub close_date: Option<Option<DateTimeWithTimeZone>>,
}

/// A campaign with its coordinators and rounds.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetails {
    #[serde(flatten)]
    pub campaign: campaign::Model,
    pub coordinator_ids: Vec<String>,
    pub rounds: Vec<round::Model>,
}

/// Service for managing campaigns.
#[derive(Clone)]
pub struct CampaignService {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl CampaignService {
    /// Create a new campaign service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, id_gen: IdGenerator) -> Self {
        Self { db, id_gen }
    }

    /// Create a campaign. The creator becomes its first coordinator.
    pub async fn create_campaign(
        &self,
        actor: &Actor,
        input: CreateCampaignInput,
    ) -> AppResult<campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if matches!((input.open_date, input.close_date), (Some(open), Some(close)) if close < open) {
            return Err(AppError::Validation(
                "close_date must not be before open_date".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let user = require_organizer(&txn, actor).await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let repo = CampaignRepository::new(&txn);
        let campaign = repo
            .create(campaign::ActiveModel {
                id: Set(self.id_gen.generate()),
                name: Set(input.name),
                open_date: Set(input.open_date),
                close_date: Set(input.close_date),
                status: Set(CampaignStatus::Active),
                active_round_id: Set(None),
                created_at: Set(now),
            })
            .await?;
        repo.add_coordinator(campaign_coord::ActiveModel {
            campaign_id: Set(campaign.id.clone()),
            user_id: Set(user.id.clone()),
            created_at: Set(now),
        })
        .await?;

        txn.commit().await.map_err(db_err)?;
        info!(campaign_id = %campaign.id, user_id = %user.id, "Created campaign");
        Ok(campaign)
    }

    /// Rename a campaign or move its open and close dates.
    pub async fn edit_campaign(
        &self,
        actor: &Actor,
        campaign_id: &str,
        input: EditCampaignInput,
    ) -> AppResult<campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let txn = self.db.begin().await.map_err(db_err)?;
        require_coordinator(&txn, actor, campaign_id).await?;
        let repo = CampaignRepository::new(&txn);
        let campaign = repo.get_by_id(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidAction(format!(
                "campaign {campaign_id} is closed"
            )));
        }

        let open_date = input.open_date.unwrap_or(campaign.open_date);
        let close_date = input.close_date.unwrap_or(campaign.close_date);
        if matches!((open_date, close_date), (Some(open), Some(close)) if close < open) {
            return Err(AppError::Validation(
                "close_date must not be before open_date".to_string(),
            ));
        }

        let mut active: campaign::ActiveModel = campaign.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        active.open_date = Set(open_date);
        active.close_date = Set(close_date);
        let campaign = repo.update(active).await?;

        txn.commit().await.map_err(db_err)?;
        info!(campaign_id = %campaign_id, name = %campaign.name, "Edited campaign");
        Ok(campaign)
    }

    /// Let a user create campaigns. Maintainers only.
    pub async fn add_organizer(&self, actor: &Actor, user_id: &str) -> AppResult<user::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let maintainer = require_maintainer(&txn, actor).await?;
        let repo = UserRepository::new(&txn);
        let target = repo.get_by_id(user_id).await?;
        if target.is_organizer {
            return Err(AppError::InvalidAction(format!(
                "user {user_id} is already an organizer"
            )));
        }

        let mut active: user::ActiveModel = target.into();
        active.is_organizer = Set(true);
        let organizer = repo.update(active).await?;

        txn.commit().await.map_err(db_err)?;
        info!(user_id = %user_id, granted_by = %maintainer.id, "Added organizer");
        Ok(organizer)
    }

    /// Add a coordinator to a campaign.
    pub async fn add_coordinator(
        &self,
        actor: &Actor,
        campaign_id: &str,
        user_id: &str,
    ) -> AppResult<campaign_coord::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        require_coordinator(&txn, actor, campaign_id).await?;
        let repo = CampaignRepository::new(&txn);
        repo.get_by_id(campaign_id).await?;
        UserRepository::new(&txn).get_by_id(user_id).await?;
        if repo.is_coordinator(campaign_id, user_id).await? {
            return Err(AppError::InvalidAction(format!(
                "user {user_id} already coordinates campaign {campaign_id}"
            )));
        }

        let coord = repo
            .add_coordinator(campaign_coord::ActiveModel {
                campaign_id: Set(campaign_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        txn.commit().await.map_err(db_err)?;
        info!(campaign_id = %campaign_id, user_id = %user_id, "Added coordinator");
        Ok(coord)
    }

    /// Cancel a campaign together with every round that is not yet closed.
    pub async fn cancel_campaign(
        &self,
        actor: &Actor,
        campaign_id: &str,
    ) -> AppResult<campaign::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        require_coordinator(&txn, actor, campaign_id).await?;
        let campaign = CampaignRepository::new(&txn).get_by_id(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidAction(format!(
                "campaign {campaign_id} is already closed"
            )));
        }

        let rounds = RoundRepository::new(&txn).find_by_campaign(campaign_id).await?;
        let mut cancelled_rounds = 0;
        let mut cancelled_tasks = 0;
        for round in rounds.iter().filter(|r| !r.status.is_terminal()) {
            let round = RoundRepository::new(&txn).get_for_update(&round.id).await?;
            cancelled_tasks += cancel_round_in(&txn, &round).await?;
            cancelled_rounds += 1;
        }

        let mut active: campaign::ActiveModel = CampaignRepository::new(&txn)
            .get_by_id(campaign_id)
            .await?
            .into();
        active.status = Set(CampaignStatus::Cancelled);
        active.active_round_id = Set(None);
        let campaign = CampaignRepository::new(&txn).update(active).await?;

        txn.commit().await.map_err(db_err)?;
        info!(
            campaign_id = %campaign_id,
            cancelled_rounds,
            cancelled_tasks,
            "Cancelled campaign"
        );
        Ok(campaign)
    }

    /// Get a campaign with its coordinators and rounds.
    pub async fn get_campaign(&self, campaign_id: &str) -> AppResult<CampaignDetails> {
        let db = self.db.as_ref();
        let repo = CampaignRepository::new(db);
        let campaign = repo.get_by_id(campaign_id).await?;
        let coordinator_ids = repo.find_coordinator_ids(campaign_id).await?;
        let rounds = RoundRepository::new(db).find_by_campaign(campaign_id).await?;
        Ok(CampaignDetails {
            campaign,
            coordinator_ids,
            rounds,
        })
    }
}
