//! Entry flags raised by jurors.

use std::sync::Arc;

use chrono::Utc;
use jury_common::{AppError, AppResult, IdGenerator};
use jury_db::{
    db_err,
    entities::{flag, round::RoundStatus},
    repositories::{FlagRepository, RoundEntryRepository, RoundRepository},
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{
    Actor,
    access::{require_coordinator, require_juror},
    ensure_status,
};

/// Input for flagging an entry.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FlagEntryInput {
    #[validate(length(max = 1024))]
    pub reason: Option<String>,
}

/// Service for entry flags. Flags are notes for coordinators and do not
/// affect tasks.
#[derive(Clone)]
pub struct FlagService {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl FlagService {
    /// Create a new flag service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, id_gen: IdGenerator) -> Self {
        Self { db, id_gen }
    }

    /// Flag an entry of a round the actor judges.
    pub async fn flag_entry(
        &self,
        actor: &Actor,
        round_id: &str,
        entry_id: &str,
        input: FlagEntryInput,
    ) -> AppResult<flag::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_by_id(round_id).await?;
        let user = require_juror(&txn, actor, round_id).await?;
        ensure_status(&round, &[RoundStatus::Active, RoundStatus::Paused], "flag entries in")?;
        let round_entry = RoundEntryRepository::new(&txn)
            .get_by_round_and_entry(round_id, entry_id)
            .await?;

        let flag = FlagRepository::new(&txn)
            .create(flag::ActiveModel {
                id: Set(self.id_gen.generate()),
                round_id: Set(round.id.clone()),
                round_entry_id: Set(round_entry.id),
                user_id: Set(user.id),
                reason: Set(input.reason),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round.id, entry_id = %entry_id, "Flagged entry");
        Ok(flag)
    }

    /// All flags raised in a round, oldest first.
    pub async fn get_round_flags(&self, actor: &Actor, round_id: &str) -> AppResult<Vec<flag::Model>> {
        let db = self.db.as_ref();
        let round = RoundRepository::new(db).get_by_id(round_id).await?;
        require_coordinator(db, actor, &round.campaign_id).await?;
        FlagRepository::new(db).find_by_round(round_id).await
    }
}
