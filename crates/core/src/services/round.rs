//! Round lifecycle service.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use jury_common::{AppError, AppResult, IdGenerator, RoundsConfig};
use jury_db::{
    db_err,
    entities::{
        campaign::{self, CampaignStatus},
        entry,
        round::{self, RoundStatus},
        round_entry, round_juror,
    },
    repositories::{
        CampaignRepository, EntryRepository, RoundEntryRepository, RoundJurorRepository,
        RoundRepository, TaskRepository, UserRepository,
    },
};
use sea_orm::{
    ActiveValue::Unchanged, ConnectionTrait, DatabaseConnection, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use validator::Validate;

use super::{
    Actor,
    access::require_coordinator,
    advancement::{self, EntrySummary, RankedEntry},
    allocation::{DedupeStats, RebalanceStats, TaskAllocator, completed_coverage},
    allocation_rng, ensure_status,
};
use crate::{
    round_config::RoundConfig,
    vote_method::{VoteMethod, VoteRules},
};

/// Input for creating a round.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoundInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 4096))]
    pub directions: Option<String>,
    /// User IDs of the jurors. Repeated IDs count once.
    #[validate(length(min = 1))]
    pub jurors: Vec<String>,
    #[validate(range(min = 1))]
    pub quorum: i32,
    pub vote_method: VoteMethod,
    pub deadline: Option<DateTimeWithTimeZone>,
    /// Round configuration keys; missing keys take their defaults.
    #[serde(default)]
    pub config: JsonValue,
}

/// A submission to import into a round.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EntryInput {
    #[validate(length(min = 1, max = 512))]
    pub name: String,
    #[validate(range(min = 0))]
    pub width: i32,
    #[validate(range(min = 0))]
    pub height: i32,
    #[validate(length(min = 1, max = 128))]
    pub mime_type: String,
    #[validate(length(max = 255))]
    pub upload_user_text: String,
    pub upload_date: Option<DateTimeWithTimeZone>,
}

/// Input for editing a round. Missing fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EditRoundInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 4096))]
    pub directions: Option<Option<String>>,
    pub deadline: Option<Option<DateTimeWithTimeZone>>,
    #[validate(range(min = 1))]
    pub quorum: Option<i32>,
    /// Replaces the active roster.
    pub jurors: Option<Vec<String>>,
    /// Configuration keys to change.
    pub config: Option<JsonValue>,
    /// Rebalance a paused round right away instead of on resume.
    #[serde(default)]
    pub rebalance: bool,
}

/// Outcome of importing entries into a round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddEntriesResult {
    pub added: u64,
    /// Entries already in the round.
    pub skipped: u64,
}

/// Entry and task totals of a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundCounts {
    pub total_entries: u64,
    pub total_disqualified_entries: u64,
    /// Tasks that are not cancelled.
    pub total_tasks: u64,
    pub total_open_tasks: u64,
    pub total_cancelled_tasks: u64,
    pub percent_tasks_open: f64,
}

impl RoundCounts {
    /// Build counts, deriving the open percentage.
    #[must_use]
    pub fn new(
        total_entries: u64,
        total_disqualified_entries: u64,
        total_tasks: u64,
        total_open_tasks: u64,
        total_cancelled_tasks: u64,
    ) -> Self {
        let percent_tasks_open = if total_tasks == 0 {
            0.0
        } else {
            total_open_tasks as f64 / total_tasks as f64 * 100.0
        };
        Self {
            total_entries,
            total_disqualified_entries,
            total_tasks,
            total_open_tasks,
            total_cancelled_tasks,
            percent_tasks_open,
        }
    }
}

/// Service driving rounds through `draft -> active <-> paused -> finalized`,
/// with `cancelled` reachable from every non-terminal state.
#[derive(Clone)]
pub struct RoundService {
    db: Arc<DatabaseConnection>,
    config: RoundsConfig,
    allocator: TaskAllocator,
    id_gen: IdGenerator,
}

impl RoundService {
    /// Create a new round service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: RoundsConfig, id_gen: IdGenerator) -> Self {
        Self {
            db,
            config,
            allocator: TaskAllocator::new(id_gen.clone()),
            id_gen,
        }
    }

    // ==================== Setup ====================

    /// Create a draft round with its jurors.
    pub async fn create_round(
        &self,
        actor: &Actor,
        campaign_id: &str,
        input: CreateRoundInput,
    ) -> AppResult<round::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let config = RoundConfig::from_json(&input.config)?;
        let jurors = distinct(input.jurors);
        if input.quorum as usize > jurors.len() {
            return Err(AppError::InvalidAction(format!(
                "quorum {} exceeds the {} jurors of the round",
                input.quorum,
                jurors.len()
            )));
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        require_coordinator(&txn, actor, campaign_id).await?;
        let campaign = CampaignRepository::new(&txn).get_by_id(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidAction(format!(
                "campaign {campaign_id} is closed"
            )));
        }
        ensure_users_exist(&txn, &jurors).await?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let round = RoundRepository::new(&txn)
            .create(round::ActiveModel {
                id: Set(self.id_gen.generate()),
                campaign_id: Set(campaign_id.to_string()),
                name: Set(input.name),
                directions: Set(input.directions),
                vote_method: Set(input.vote_method),
                quorum: Set(input.quorum),
                status: Set(RoundStatus::Draft),
                deadline: Set(input.deadline),
                config: Set(config.to_json()?),
                rebalance_pending: Set(false),
                final_threshold: Set(None),
                created_at: Set(now),
                activated_at: Set(None),
                closed_at: Set(None),
            })
            .await?;

        let juror_repo = RoundJurorRepository::new(&txn);
        for user_id in &jurors {
            juror_repo
                .create(round_juror::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    round_id: Set(round.id.clone()),
                    user_id: Set(user_id.clone()),
                    is_active: Set(true),
                    created_at: Set(now),
                })
                .await?;
        }

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            campaign_id = %campaign_id,
            vote_method = round.vote_method.as_str(),
            quorum = round.quorum,
            jurors = jurors.len(),
            "Created round"
        );
        Ok(round)
    }

    /// Import entries by name into a draft or paused round. Entries already
    /// known by name are reused.
    pub async fn add_entries(
        &self,
        actor: &Actor,
        round_id: &str,
        entries: Vec<EntryInput>,
    ) -> AppResult<AddEntriesResult> {
        for input in &entries {
            input
                .validate()
                .map_err(|e| AppError::Validation(e.to_string()))?;
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Draft, RoundStatus::Paused], "add entries to")?;

        let entry_repo = EntryRepository::new(&txn);
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let mut by_name: HashMap<String, String> = entry_repo
            .find_by_names(&names)
            .await?
            .into_iter()
            .map(|e| (e.name, e.id))
            .collect();

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut entry_ids = Vec::with_capacity(entries.len());
        for input in entries {
            if let Some(id) = by_name.get(&input.name) {
                entry_ids.push(id.clone());
                continue;
            }
            let created = entry_repo
                .create(entry::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    name: Set(input.name),
                    width: Set(input.width),
                    height: Set(input.height),
                    mime_type: Set(input.mime_type),
                    upload_user_text: Set(input.upload_user_text),
                    upload_date: Set(input.upload_date),
                    created_at: Set(now),
                })
                .await?;
            entry_ids.push(created.id.clone());
            by_name.insert(created.name, created.id);
        }

        let result = self.attach_entries(&txn, &round, &entry_ids).await?;
        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            added = result.added,
            skipped = result.skipped,
            "Added entries to round"
        );
        Ok(result)
    }

    /// Add entries that are already stored, e.g. the advancing group of a
    /// previous round.
    pub async fn add_existing_entries(
        &self,
        actor: &Actor,
        round_id: &str,
        entry_ids: Vec<String>,
    ) -> AppResult<AddEntriesResult> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Draft, RoundStatus::Paused], "add entries to")?;

        let wanted = distinct(entry_ids.clone());
        let found: HashSet<String> = EntryRepository::new(&txn)
            .find_by_ids(&wanted)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        if let Some(missing) = wanted.iter().find(|id| !found.contains(*id)) {
            return Err(AppError::DoesNotExist(format!("entry {missing}")));
        }

        let result = self.attach_entries(&txn, &round, &entry_ids).await?;
        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            added = result.added,
            skipped = result.skipped,
            "Added existing entries to round"
        );
        Ok(result)
    }

    // ==================== Transitions ====================

    /// Start a draft round or resume a paused one.
    pub async fn activate_round(&self, actor: &Actor, round_id: &str) -> AppResult<RoundCounts> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        let mut rng = allocation_rng(&self.config);

        let mut active: round::ActiveModel = round.clone().into();
        match round.status {
            RoundStatus::Draft => {
                self.ensure_no_other_round_in_progress(&txn, &round).await?;
                let eligible = RoundEntryRepository::new(&txn)
                    .find_eligible_by_round(&round.id)
                    .await?;
                if eligible.is_empty() {
                    return Err(AppError::InvalidAction(format!(
                        "round {} has no entries",
                        round.id
                    )));
                }
                self.allocator.assign(&txn, &round, &mut rng).await?;
                active.activated_at = Set(Some(Utc::now().into()));
            }
            RoundStatus::Paused => {
                self.ensure_no_other_round_in_progress(&txn, &round).await?;
                let jurors = RoundJurorRepository::new(&txn)
                    .count_active_by_round(&round.id)
                    .await?;
                if round.quorum as u64 > jurors {
                    return Err(AppError::InvalidAction(format!(
                        "quorum {} exceeds the {jurors} active jurors of round {}",
                        round.quorum, round.id
                    )));
                }
                let violations = TaskAllocator::check_integrity(&txn, &round).await?;
                if !violations.is_empty() && !round.rebalance_pending {
                    warn!(
                        round_id = %round.id,
                        violations = violations.len(),
                        "Resuming round with allocation problems"
                    );
                }
                if round.rebalance_pending || !violations.is_empty() {
                    self.allocator.rebalance(&txn, &round, &mut rng).await?;
                }
            }
            _ => {
                return Err(AppError::InvalidAction(format!(
                    "cannot activate round {} while it is {}",
                    round.id,
                    round.status.as_str()
                )));
            }
        }

        active.status = Set(RoundStatus::Active);
        active.rebalance_pending = Set(false);
        let round = RoundRepository::new(&txn).update(active).await?;
        set_campaign_round(&txn, &round.campaign_id, Some(round.id.clone())).await?;
        let counts = round_counts(&txn, &round.id).await?;

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            total_tasks = counts.total_tasks,
            open_tasks = counts.total_open_tasks,
            "Activated round"
        );
        Ok(counts)
    }

    /// Pause an active round.
    pub async fn pause_round(&self, actor: &Actor, round_id: &str) -> AppResult<RoundStatus> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Active], "pause")?;

        let mut active: round::ActiveModel = round.into();
        active.status = Set(RoundStatus::Paused);
        let round = RoundRepository::new(&txn).update(active).await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round.id, "Paused round");
        Ok(round.status)
    }

    /// Edit round settings. Quorum and roster changes need a draft or paused
    /// round.
    pub async fn edit_round(
        &self,
        actor: &Actor,
        round_id: &str,
        input: EditRoundInput,
    ) -> AppResult<round::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(
            &round,
            &[RoundStatus::Draft, RoundStatus::Active, RoundStatus::Paused],
            "edit",
        )?;
        if (input.quorum.is_some() || input.jurors.is_some())
            && !matches!(round.status, RoundStatus::Draft | RoundStatus::Paused)
        {
            return Err(AppError::InvalidAction(format!(
                "pause round {} before changing its quorum or jurors",
                round.id
            )));
        }

        let config = match &input.config {
            Some(patch) => Some(RoundConfig::from_stored(&round.config)?.merged(patch)?),
            None => None,
        };

        let juror_repo = RoundJurorRepository::new(&txn);
        let roster = juror_repo.find_by_round(&round.id).await?;
        let jurors = input.jurors.map(distinct);
        let active_after = match &jurors {
            Some(jurors) => {
                ensure_users_exist(&txn, jurors).await?;
                jurors.len()
            }
            None => roster.iter().filter(|j| j.is_active).count(),
        };
        let quorum = input.quorum.unwrap_or(round.quorum);
        if quorum as usize > active_after {
            return Err(AppError::InvalidAction(format!(
                "quorum {quorum} exceeds the {active_after} active jurors of the round"
            )));
        }
        if quorum < round.quorum && round.status == RoundStatus::Paused {
            let snapshot = TaskAllocator::snapshot(&txn, &round).await?;
            let coverage = completed_coverage(&snapshot);
            if (quorum as usize) < coverage {
                return Err(AppError::InvalidAction(format!(
                    "quorum {quorum} is below the {coverage} completed votes of some entries"
                )));
            }
        }

        let roster_changed = match &jurors {
            Some(jurors) => self.replace_roster(&txn, &round.id, &roster, jurors).await?,
            None => false,
        };
        let needs_rebalance =
            round.status == RoundStatus::Paused && (roster_changed || quorum != round.quorum);

        let mut active: round::ActiveModel = round.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(directions) = input.directions {
            active.directions = Set(directions);
        }
        if let Some(deadline) = input.deadline {
            active.deadline = Set(deadline);
        }
        if let Some(config) = config {
            active.config = Set(config.to_json()?);
        }
        active.quorum = Set(quorum);
        if needs_rebalance {
            active.rebalance_pending = Set(true);
        }
        let mut updated = RoundRepository::new(&txn).update(active).await?;

        if input.rebalance && updated.rebalance_pending && updated.status == RoundStatus::Paused {
            let mut rng = allocation_rng(&self.config);
            self.allocator.rebalance(&txn, &updated, &mut rng).await?;
            let mut active: round::ActiveModel = updated.into();
            active.rebalance_pending = Set(false);
            updated = RoundRepository::new(&txn).update(active).await?;
        }

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %updated.id,
            quorum = updated.quorum,
            roster_changed,
            rebalance_pending = updated.rebalance_pending,
            "Edited round"
        );
        Ok(updated)
    }

    /// Bring a paused round back to full quorum.
    pub async fn rebalance_round(&self, actor: &Actor, round_id: &str) -> AppResult<RebalanceStats> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Paused], "rebalance")?;

        let mut rng = allocation_rng(&self.config);
        let stats = self.allocator.rebalance(&txn, &round, &mut rng).await?;
        if round.rebalance_pending {
            let mut active: round::ActiveModel = round.into();
            active.rebalance_pending = Set(false);
            RoundRepository::new(&txn).update(active).await?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(stats)
    }

    /// Randomly reassign every open task of a paused round across the
    /// current roster. Also settles a pending rebalance.
    pub async fn shuffle_round_assignments(
        &self,
        actor: &Actor,
        round_id: &str,
    ) -> AppResult<RebalanceStats> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Paused], "reshuffle")?;

        let mut rng = allocation_rng(&self.config);
        let stats = self.allocator.reshuffle(&txn, &round, &mut rng).await?;
        if round.rebalance_pending {
            let mut active: round::ActiveModel = round.into();
            active.rebalance_pending = Set(false);
            RoundRepository::new(&txn).update(active).await?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(stats)
    }

    /// Remove duplicate assignments from a paused round.
    pub async fn deduplicate_round(&self, actor: &Actor, round_id: &str) -> AppResult<DedupeStats> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        ensure_status(&round, &[RoundStatus::Paused], "deduplicate")?;

        let mut rng = allocation_rng(&self.config);
        let stats = self.allocator.deduplicate(&txn, &round, &mut rng).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(stats)
    }

    /// Cancel a round and all of its remaining tasks. Votes stay stored but
    /// no longer count.
    pub async fn cancel_round(&self, actor: &Actor, round_id: &str) -> AppResult<RoundCounts> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;

        let cancelled = cancel_round_in(&txn, &round).await?;
        let counts = round_counts(&txn, &round.id).await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round.id, cancelled_tasks = cancelled, "Cancelled round");
        Ok(counts)
    }

    // ==================== Finalization ====================

    /// Close a rating or yes/no round at `threshold` and return the entries
    /// that advance.
    pub async fn finalize_rating_round(
        &self,
        actor: &Actor,
        round_id: &str,
        threshold: f64,
    ) -> AppResult<Vec<EntrySummary>> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::Validation(format!(
                "threshold must be a non-negative number (got {threshold})"
            )));
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        if !round.vote_method.uses_threshold() {
            return Err(AppError::InvalidAction(format!(
                "round {} is a ranking round",
                round.id
            )));
        }
        ensure_finalizable(&txn, &round).await?;

        let summary = advancement::summarize(&txn, &round).await?;
        let advancing = advancement::advancing_group(&summary, threshold);

        let mut active: round::ActiveModel = round.clone().into();
        active.status = Set(RoundStatus::Finalized);
        active.final_threshold = Set(Some(threshold));
        active.closed_at = Set(Some(Utc::now().into()));
        RoundRepository::new(&txn).update(active).await?;
        clear_campaign_round(&txn, &round).await?;

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            threshold,
            advancing = advancing.len(),
            under_voted = summary.under_voted.len(),
            "Finalized rating round"
        );
        Ok(advancing)
    }

    /// Close a ranking round and return its final order.
    pub async fn finalize_ranking_round(
        &self,
        actor: &Actor,
        round_id: &str,
    ) -> AppResult<Vec<RankedEntry>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        if round.vote_method != VoteMethod::Ranking {
            return Err(AppError::InvalidAction(format!(
                "round {} is not a ranking round",
                round.id
            )));
        }
        ensure_finalizable(&txn, &round).await?;

        let summary = advancement::summarize(&txn, &round).await?;
        let ranked = advancement::rank_entries(&summary);

        let mut active: round::ActiveModel = round.clone().into();
        active.status = Set(RoundStatus::Finalized);
        active.closed_at = Set(Some(Utc::now().into()));
        RoundRepository::new(&txn).update(active).await?;
        clear_campaign_round(&txn, &round).await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round.id, ranked = ranked.len(), "Finalized ranking round");
        Ok(ranked)
    }

    /// Reopen a finalized rating or yes/no round as paused.
    pub async fn unfinalize_rating_round(
        &self,
        actor: &Actor,
        round_id: &str,
    ) -> AppResult<round::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let round = RoundRepository::new(&txn).get_for_update(round_id).await?;
        require_coordinator(&txn, actor, &round.campaign_id).await?;
        if !round.vote_method.uses_threshold() {
            return Err(AppError::InvalidAction(format!(
                "round {} is a ranking round",
                round.id
            )));
        }
        ensure_status(&round, &[RoundStatus::Finalized], "unfinalize")?;
        let others = RoundRepository::new(&txn)
            .find_in_progress_by_campaign(&round.campaign_id, &round.id)
            .await?;
        if let Some(other) = others.first() {
            return Err(AppError::InvalidAction(format!(
                "round {} of the campaign is still {}",
                other.id,
                other.status.as_str()
            )));
        }

        let mut active: round::ActiveModel = round.into();
        active.status = Set(RoundStatus::Paused);
        active.final_threshold = Set(None);
        active.closed_at = Set(None);
        let round = RoundRepository::new(&txn).update(active).await?;
        set_campaign_round(&txn, &round.campaign_id, Some(round.id.clone())).await?;

        txn.commit().await.map_err(db_err)?;
        info!(round_id = %round.id, "Unfinalized round");
        Ok(round)
    }

    // ==================== Queries ====================

    /// Entry and task totals of a round.
    pub async fn get_round_counts(&self, round_id: &str) -> AppResult<RoundCounts> {
        let db = self.db.as_ref();
        RoundRepository::new(db).get_by_id(round_id).await?;
        round_counts(db, round_id).await
    }

    /// Get a round by ID.
    pub async fn get_round(&self, round_id: &str) -> AppResult<round::Model> {
        RoundRepository::new(self.db.as_ref())
            .get_by_id(round_id)
            .await
    }

    // ==================== Helpers ====================

    async fn ensure_no_other_round_in_progress<C: ConnectionTrait>(
        &self,
        db: &C,
        round: &round::Model,
    ) -> AppResult<()> {
        if !self.config.single_active_round {
            return Ok(());
        }
        let others = RoundRepository::new(db)
            .find_in_progress_by_campaign(&round.campaign_id, &round.id)
            .await?;
        match others.first() {
            Some(other) => Err(AppError::InvalidAction(format!(
                "round {} of the campaign is already {}",
                other.id,
                other.status.as_str()
            ))),
            None => Ok(()),
        }
    }

    async fn attach_entries<C: ConnectionTrait>(
        &self,
        db: &C,
        round: &round::Model,
        entry_ids: &[String],
    ) -> AppResult<AddEntriesResult> {
        let round_entries = RoundEntryRepository::new(db);
        let mut present: HashSet<String> = round_entries
            .find_by_round(&round.id)
            .await?
            .into_iter()
            .map(|re| re.entry_id)
            .collect();

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut result = AddEntriesResult::default();
        for entry_id in entry_ids {
            if !present.insert(entry_id.clone()) {
                result.skipped += 1;
                continue;
            }
            round_entries
                .create(round_entry::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    round_id: Set(round.id.clone()),
                    entry_id: Set(entry_id.clone()),
                    dq_reason: Set(None),
                    dq_user_id: Set(None),
                    dq_date: Set(None),
                    created_at: Set(now),
                })
                .await?;
            result.added += 1;
        }

        // New entries of a running round have no tasks yet.
        if round.status == RoundStatus::Paused && result.added > 0 && !round.rebalance_pending {
            let mut active: round::ActiveModel = round.clone().into();
            active.rebalance_pending = Set(true);
            RoundRepository::new(db).update(active).await?;
        }
        Ok(result)
    }

    /// Make exactly `jurors` the active roster. Returns whether anything
    /// changed.
    async fn replace_roster<C: ConnectionTrait>(
        &self,
        db: &C,
        round_id: &str,
        roster: &[round_juror::Model],
        jurors: &[String],
    ) -> AppResult<bool> {
        let repo = RoundJurorRepository::new(db);
        let wanted: HashSet<&str> = jurors.iter().map(String::as_str).collect();
        let mut changed = false;

        for row in roster {
            let should_be_active = wanted.contains(row.user_id.as_str());
            if row.is_active != should_be_active {
                let mut active: round_juror::ActiveModel = row.clone().into();
                active.is_active = Set(should_be_active);
                repo.update(active).await?;
                changed = true;
            }
        }

        let known: HashSet<&str> = roster.iter().map(|j| j.user_id.as_str()).collect();
        let now: DateTimeWithTimeZone = Utc::now().into();
        for user_id in jurors.iter().filter(|id| !known.contains(id.as_str())) {
            repo.create(round_juror::ActiveModel {
                id: Set(self.id_gen.generate()),
                round_id: Set(round_id.to_string()),
                user_id: Set(user_id.clone()),
                is_active: Set(true),
                created_at: Set(now),
            })
            .await?;
            changed = true;
        }
        Ok(changed)
    }
}

/// Count a round's entries and tasks.
pub(crate) async fn round_counts<C: ConnectionTrait>(db: &C, round_id: &str) -> AppResult<RoundCounts> {
    let entries = RoundEntryRepository::new(db);
    let tasks = TaskRepository::new(db);
    Ok(RoundCounts::new(
        entries.count_by_round(round_id).await?,
        entries.count_disqualified_by_round(round_id).await?,
        tasks.count_active_by_round(round_id).await?,
        tasks.count_open_by_round(round_id).await?,
        tasks.count_cancelled_by_round(round_id).await?,
    ))
}

/// Cancel a locked, non-terminal round: every active task is cancelled and
/// the campaign stops pointing at it. Returns the number of cancelled tasks.
pub(crate) async fn cancel_round_in<C: ConnectionTrait>(
    db: &C,
    round: &round::Model,
) -> AppResult<u64> {
    ensure_status(
        round,
        &[RoundStatus::Draft, RoundStatus::Active, RoundStatus::Paused],
        "cancel",
    )?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let cancelled = TaskRepository::new(db)
        .cancel_active_by_round(&round.id, now)
        .await?;

    let mut active: round::ActiveModel = round.clone().into();
    active.status = Set(RoundStatus::Cancelled);
    active.rebalance_pending = Set(false);
    active.closed_at = Set(Some(now));
    RoundRepository::new(db).update(active).await?;
    clear_campaign_round(db, round).await?;
    Ok(cancelled)
}

async fn ensure_finalizable<C: ConnectionTrait>(db: &C, round: &round::Model) -> AppResult<()> {
    ensure_status(round, &[RoundStatus::Active, RoundStatus::Paused], "finalize")?;
    // Edits to quorum or roster are only reflected in tasks after a rebalance.
    if round.rebalance_pending {
        return Err(AppError::InvalidAction(format!(
            "round {} has a pending rebalance; rebalance or resume it first",
            round.id
        )));
    }
    let open =TaskRepository::new(db).count_open_by_round(&round.id).await?;
    if open > 0 {
        return Err(AppError::InvalidAction(format!(
            "round {} still has {open} open tasks",
            round.id
        )));
    }
    Ok(())
}

async fn ensure_users_exist<C: ConnectionTrait>(db: &C, user_ids: &[String]) -> AppResult<()> {
    let found: HashSet<String> = UserRepository::new(db)
        .find_by_ids(user_ids)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();
    match user_ids.iter().find(|id| !found.contains(*id)) {
        Some(missing) => Err(AppError::DoesNotExist(format!("user {missing}"))),
        None => Ok(()),
    }
}

async fn set_campaign_round<C: ConnectionTrait>(
    db: &C,
    campaign_id: &str,
    round_id: Option<String>,
) -> AppResult<()> {
    CampaignRepository::new(db)
        .update(campaign::ActiveModel {
            id: Unchanged(campaign_id.to_string()),
            active_round_id: Set(round_id),
            ..Default::default()
        })
        .await?;
    Ok(())
}

/// Clear the campaign's active round pointer if it points at `round`.
async fn clear_campaign_round<C: ConnectionTrait>(db: &C, round: &round::Model) -> AppResult<()> {
    let campaign = CampaignRepository::new(db).get_by_id(&round.campaign_id).await?;
    if campaign.active_round_id.as_deref() == Some(round.id.as_str()) {
        set_campaign_round(db, &campaign.id, None).await?;
    }
    Ok(())
}

/// Drop repeated values, keeping first occurrences in order.
fn distinct(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
