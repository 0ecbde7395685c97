//! Task allocation.
//!
//! [`TaskAllocator`] turns a round's roster, quorum and eligible entries into
//! tasks, and repairs the task set after roster, quorum or disqualification
//! changes. It never opens its own transaction: callers pass the transaction
//! in which they already hold the round lock.

mod plan;

pub use plan::{
    AllocationPlan, IntegrityViolation, PlannedTask, RoundSnapshot, check_integrity,
    completed_coverage, plan_dedupe, plan_initial, plan_rebalance, plan_reshuffle,
};

use chrono::Utc;
use jury_common::{AppError, AppResult, IdGenerator};
use jury_db::{
    entities::{round, task},
    repositories::{RoundEntryRepository, RoundJurorRepository, TaskRepository},
};
use rand::Rng;
use sea_orm::{ConnectionTrait, Set, prelude::DateTimeWithTimeZone};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::round_quorum;

/// Outcome of a rebalance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebalanceStats {
    pub cancelled_tasks: u64,
    pub created_tasks: u64,
    pub reassigned_tasks: u64,
    pub unfilled_slots: u64,
    /// Mean active tasks per active juror afterwards.
    pub task_count_mean: f64,
}

/// Outcome of a duplicate cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupeStats {
    pub duplicate_pairs: u64,
    pub cancelled_tasks: u64,
    pub created_tasks: u64,
    pub unfilled_slots: u64,
}

/// Creates, cancels and replaces tasks for a round.
#[derive(Clone, Debug)]
pub struct TaskAllocator {
    id_gen: IdGenerator,
}

impl TaskAllocator {
    /// Create a new allocator.
    #[must_use]
    pub const fn new(id_gen: IdGenerator) -> Self {
        Self { id_gen }
    }

    /// Load the allocation-relevant state of a round.
    pub async fn snapshot<C: ConnectionTrait>(
        db: &C,
        round: &round::Model,
    ) -> AppResult<RoundSnapshot> {
        let quorum = round_quorum(round)?;
        let jurors = RoundJurorRepository::new(db)
            .find_active_by_round(&round.id)
            .await?
            .into_iter()
            .map(|j| j.user_id)
            .collect();
        let entries = RoundEntryRepository::new(db)
            .find_eligible_by_round(&round.id)
            .await?
            .into_iter()
            .map(|re| re.id)
            .collect();
        let tasks = TaskRepository::new(db)
            .find_active_by_round(&round.id)
            .await?;

        Ok(RoundSnapshot {
            quorum,
            jurors,
            entries,
            tasks,
        })
    }

    /// Create the first tasks of a round: `quorum` tasks with distinct
    /// jurors for every eligible entry. Returns the number of tasks created.
    pub async fn assign<C, R>(&self, db: &C, round: &round::Model, rng: &mut R) -> AppResult<u64>
    where
        C: ConnectionTrait,
        R: Rng + ?Sized,
    {
        let snapshot = Self::snapshot(db, round).await?;
        if !snapshot.tasks.is_empty() {
            return Err(AppError::InvalidAction(format!(
                "round {} already has tasks",
                round.id
            )));
        }

        let planned = plan_initial(&snapshot.entries, &snapshot.jurors, snapshot.quorum, rng)?;
        let created = self.apply(db, &round.id, &[], &planned).await?.1;

        info!(
            round_id = %round.id,
            entries = snapshot.entries.len(),
            jurors = snapshot.jurors.len(),
            quorum = snapshot.quorum,
            created,
            "Assigned round tasks"
        );
        Ok(created)
    }

    /// Bring every eligible entry back to `quorum` distinct active jurors.
    ///
    /// Integrity problems left afterwards are logged as consistency
    /// violations and repaired with [`Self::deduplicate`]; they are not
    /// returned to the caller.
    pub async fn rebalance<C, R>(
        &self,
        db: &C,
        round: &round::Model,
        rng: &mut R,
    ) -> AppResult<RebalanceStats>
    where
        C: ConnectionTrait,
        R: Rng + ?Sized,
    {
        let snapshot = Self::snapshot(db, round).await?;
        let plan = plan_rebalance(&snapshot, rng);
        debug!(
            round_id = %round.id,
            cancel = plan.cancel.len(),
            create = plan.create.len(),
            "Planned rebalance"
        );
        let stats = self.apply_checked(db, round, &plan, rng).await?;
        info!(
            round_id = %round.id,
            cancelled = stats.cancelled_tasks,
            created = stats.created_tasks,
            reassigned = stats.reassigned_tasks,
            "Rebalanced round"
        );
        Ok(stats)
    }

    /// Cancel every open task and deal the freed slots out again across the
    /// active roster. Completed tasks are kept.
    pub async fn reshuffle<C, R>(
        &self,
        db: &C,
        round: &round::Model,
        rng: &mut R,
    ) -> AppResult<RebalanceStats>
    where
        C: ConnectionTrait,
        R: Rng + ?Sized,
    {
        let snapshot = Self::snapshot(db, round).await?;
        let plan = plan_reshuffle(&snapshot, rng);
        let stats = self.apply_checked(db, round, &plan, rng).await?;
        info!(
            round_id = %round.id,
            cancelled = stats.cancelled_tasks,
            created = stats.created_tasks,
            reassigned = stats.reassigned_tasks,
            task_count_mean = stats.task_count_mean,
            "Reshuffled round tasks"
        );
        Ok(stats)
    }

    async fn apply_checked<C, R>(
        &self,
        db: &C,
        round: &round::Model,
        plan: &AllocationPlan,
        rng: &mut R,
    ) -> AppResult<RebalanceStats>
    where
        C: ConnectionTrait,
        R: Rng + ?Sized,
    {
        let (cancelled, created) = self.apply(db, &round.id, &plan.cancel, &plan.create).await?;
        let mut stats = RebalanceStats {
            cancelled_tasks: cancelled,
            created_tasks: created,
            reassigned_tasks: plan.reassigned as u64,
            unfilled_slots: plan.unfilled_slots as u64,
            task_count_mean: plan.task_count_mean(),
        };

        let violations = Self::check_integrity(db, round).await?;
        if !violations.is_empty() {
            for violation in &violations {
                let err = AppError::ConsistencyViolation(violation.to_string());
                error!(round_id = %round.id, error = %err, "Allocation invariant broken after reallocation");
            }
            let dedupe = self.deduplicate(db, round, rng).await?;
            stats.cancelled_tasks += dedupe.cancelled_tasks;
            stats.created_tasks += dedupe.created_tasks;
            stats.unfilled_slots += dedupe.unfilled_slots;
        }

        if stats.unfilled_slots > 0 {
            warn!(
                round_id = %round.id,
                unfilled_slots = stats.unfilled_slots,
                "Not enough eligible jurors to reach quorum"
            );
        }
        Ok(stats)
    }

    /// Cancel duplicate (entry, juror) tasks and top entries back up to
    /// quorum.
    pub async fn deduplicate<C, R>(
        &self,
        db: &C,
        round: &round::Model,
        rng: &mut R,
    ) -> AppResult<DedupeStats>
    where
        C: ConnectionTrait,
        R: Rng + ?Sized,
    {
        let snapshot = Self::snapshot(db, round).await?;
        let plan = plan_dedupe(&snapshot, rng);
        let (cancelled, created) = self.apply(db, &round.id, &plan.cancel, &plan.create).await?;

        let stats = DedupeStats {
            duplicate_pairs: plan.duplicate_pairs as u64,
            cancelled_tasks: cancelled,
            created_tasks: created,
            unfilled_slots: plan.unfilled_slots as u64,
        };
        if stats.duplicate_pairs > 0 {
            info!(
                round_id = %round.id,
                duplicate_pairs = stats.duplicate_pairs,
                cancelled,
                created,
                "Removed duplicate assignments"
            );
        }
        Ok(stats)
    }

    /// Find duplicate assignments and quorum mismatches.
    pub async fn check_integrity<C: ConnectionTrait>(
        db: &C,
        round: &round::Model,
    ) -> AppResult<Vec<IntegrityViolation>> {
        let snapshot = Self::snapshot(db, round).await?;
        Ok(check_integrity(&snapshot))
    }

    async fn apply<C: ConnectionTrait>(
        &self,
        db: &C,
        round_id: &str,
        cancel: &[String],
        create: &[PlannedTask],
    ) -> AppResult<(u64, u64)> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let tasks = TaskRepository::new(db);

        let cancelled = tasks.cancel(cancel, now).await?;
        let models = create
            .iter()
            .map(|planned| task::ActiveModel {
                id: Set(self.id_gen.generate()),
                round_id: Set(round_id.to_string()),
                round_entry_id: Set(planned.round_entry_id.clone()),
                user_id: Set(planned.user_id.clone()),
                created_at: Set(now),
                complete_date: Set(None),
                cancel_date: Set(None),
                skipped_at: Set(None),
            })
            .collect();
        let created = tasks.create_many(models).await?;

        Ok((cancelled, created))
    }
}
