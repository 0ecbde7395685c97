//! Ballot service: juror task queues and vote recording.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use jury_common::{AppError, AppResult, IdGenerator, RoundsConfig};
use jury_db::{
    db_err,
    entities::{entry, round::RoundStatus, task, vote},
    repositories::{RoundEntryRepository, RoundRepository, TaskRepository, VoteRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    Actor,
    access::{load_actor, require_juror},
    ensure_status,
};
use crate::vote_method::VoteRules;

/// One vote in a ballot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BallotItem {
    pub task_id: String,
    pub value: f64,
    #[serde(default)]
    pub review: Option<String>,
}

/// An open task with the entry to judge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JurorTask {
    pub task: task::Model,
    pub entry: entry::Model,
}

/// A vote a juror has cast, with its entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JurorVote {
    pub vote: vote::Model,
    pub entry: entry::Model,
}

/// Service for jurors' task queues and ballots.
#[derive(Clone)]
pub struct BallotService {
    db: Arc<DatabaseConnection>,
    config: RoundsConfig,
    id_gen: IdGenerator,
}

impl BallotService {
    /// Create a new ballot service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, config: RoundsConfig, id_gen: IdGenerator) -> Self {
        Self { db, config, id_gen }
    }

    /// Record a ballot. Every item completes its task and overwrites any
    /// earlier vote on it. Returns the number of votes recorded.
    ///
    /// Ranking ballots are all-or-nothing: they must cover exactly the
    /// juror's open tasks, or exactly their completed tasks to edit a
    /// ranking already submitted.
    pub async fn submit(
        &self,
        actor: &Actor,
        round_id: &str,
        ballot: Vec<BallotItem>,
    ) -> AppResult<u64> {
        self.check_ballot_shape(&ballot)?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let user = load_actor(&txn, actor).await?;
        let task_ids: Vec<String> = ballot.iter().map(|item| item.task_id.clone()).collect();
        let tasks = TaskRepository::new(&txn).find_by_ids(&task_ids).await?;
        let by_id: HashMap<&str, &task::Model> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        if let Some(missing) = task_ids.iter().find(|id| !by_id.contains_key(id.as_str())) {
            return Err(AppError::DoesNotExist(format!("task {missing}")));
        }
        if let Some(task) = tasks.iter().find(|t| t.round_id != round_id) {
            return Err(AppError::InvalidAction(format!(
                "task {} belongs to round {}, not {round_id}",
                task.id, task.round_id
            )));
        }
        if let Some(task) = tasks.iter().find(|t| t.user_id != user.id) {
            return Err(AppError::PermissionDenied(format!(
                "task {} is assigned to another juror",
                task.id
            )));
        }
        if let Some(task) = tasks.iter().find(|t| !t.is_active()) {
            return Err(AppError::InvalidAction(format!(
                "task {} has been cancelled",
                task.id
            )));
        }

        let round_entries = RoundEntryRepository::new(&txn).find_by_round(round_id).await?;
        let disqualified: HashSet<&str> = round_entries
            .iter()
            .filter(|re| re.is_disqualified())
            .map(|re| re.id.as_str())
            .collect();
        if let Some(task) = tasks
            .iter()
            .find(|t| disqualified.contains(t.round_entry_id.as_str()))
        {
            return Err(AppError::InvalidAction(format!(
                "task {} is for a disqualified entry",
                task.id
            )));
        }

        let round = RoundRepository::new(&txn).get_by_id(round_id).await?;
        ensure_status(&round, &[RoundStatus::Active], "vote in")?;

        let eligible_entries = round_entries.len() - disqualified.len();
        for item in &ballot {
            round.vote_method.validate_value(item.value, eligible_entries)?;
        }

        if !round.vote_method.allows_partial_ballots() {
            let repo = TaskRepository::new(&txn);
            let open = repo.find_open_by_juror(round_id, &user.id).await?;
            let completed = repo.find_completed_by_juror(round_id, &user.id).await?;
            check_full_ballot(&task_ids, &open, &completed, &disqualified)?;
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let newly_completed = TaskRepository::new(&txn).complete(&task_ids, now).await?;
        let votes = VoteRepository::new(&txn);
        for item in ballot {
            let Some(task) = by_id.get(item.task_id.as_str()) else {
                continue;
            };
            votes
                .upsert(vote::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    task_id: Set(item.task_id),
                    round_id: Set(round.id.clone()),
                    round_entry_id: Set(task.round_entry_id.clone()),
                    user_id: Set(user.id.clone()),
                    value: Set(item.value),
                    review: Set(item.review),
                    created_at: Set(now),
                    modified_at: Set(now),
                })
                .await?;
        }

        txn.commit().await.map_err(db_err)?;
        info!(
            round_id = %round.id,
            user_id = %user.id,
            votes = task_ids.len(),
            newly_completed,
            "Recorded ballot"
        );
        Ok(task_ids.len() as u64)
    }

    /// Put an open task at the back of the juror's queue and return their
    /// next batch.
    pub async fn skip(&self, actor: &Actor, task_id: &str) -> AppResult<Vec<JurorTask>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let user = load_actor(&txn, actor).await?;
        let task = TaskRepository::new(&txn).get_by_id(task_id).await?;
        if task.user_id != user.id {
            return Err(AppError::PermissionDenied(format!(
                "task {task_id} is assigned to another juror"
            )));
        }
        let round = RoundRepository::new(&txn).get_by_id(&task.round_id).await?;
        ensure_status(&round, &[RoundStatus::Active], "skip tasks in")?;
        if !round.vote_method.allows_skip() {
            return Err(AppError::InvalidAction(format!(
                "tasks of {} rounds cannot be skipped",
                round.vote_method.as_str()
            )));
        }
        if !task.is_open() {
            return Err(AppError::InvalidAction(format!("task {task_id} is not open")));
        }

        TaskRepository::new(&txn)
            .mark_skipped(task_id, Utc::now().into())
            .await?;
        txn.commit().await.map_err(db_err)?;
        debug!(task_id = %task_id, user_id = %user.id, "Skipped task");

        self.get_next_tasks(actor, &round.id, self.config.task_batch_size, 0)
            .await
    }

    /// The juror's open tasks: never-skipped ones first in creation order,
    /// then skipped ones in the order they were skipped.
    pub async fn get_next_tasks(
        &self,
        actor: &Actor,
        round_id: &str,
        count: u64,
        offset: u64,
    ) -> AppResult<Vec<JurorTask>> {
        let db = self.db.as_ref();
        RoundRepository::new(db).get_by_id(round_id).await?;
        let user = require_juror(db, actor, round_id).await?;

        let mut tasks = TaskRepository::new(db)
            .find_open_by_juror(round_id, &user.id)
            .await?;
        tasks.sort_by(|a, b| (a.skipped_at, &a.id).cmp(&(b.skipped_at, &b.id)));
        let batch: Vec<task::Model> = tasks
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .collect();

        let ids: Vec<String> = batch.iter().map(|t| t.round_entry_id.clone()).collect();
        let mut entries = entries_by_round_entry(db, &ids).await?;
        batch
            .into_iter()
            .map(|task| match entries.remove(&task.round_entry_id) {
                Some(entry) => Ok(JurorTask { task, entry }),
                None => Err(missing_entry(&task.round_entry_id)),
            })
            .collect()
    }

    /// The juror's votes in a round that still count.
    pub async fn get_juror_votes(&self, actor: &Actor, round_id: &str) -> AppResult<Vec<JurorVote>> {
        let db = self.db.as_ref();
        RoundRepository::new(db).get_by_id(round_id).await?;
        let user = load_actor(db, actor).await?;

        let votes = VoteRepository::new(db)
            .find_counted_by_juror(round_id, &user.id)
            .await?;
        let ids: Vec<String> = votes.iter().map(|v| v.round_entry_id.clone()).collect();
        let entries = entries_by_round_entry(db, &ids).await?;
        votes
            .into_iter()
            .map(|vote| match entries.get(&vote.round_entry_id) {
                Some(entry) => Ok(JurorVote {
                    entry: entry.clone(),
                    vote,
                }),
                None => Err(missing_entry(&vote.round_entry_id)),
            })
            .collect()
    }

    /// Checks that need no store access.
    fn check_ballot_shape(&self, ballot: &[BallotItem]) -> AppResult<()> {
        if ballot.is_empty() {
            return Err(AppError::InvalidAction("ballot is empty".to_string()));
        }
        let max = self.config.max_review_bytes;
        if let Some(item) = ballot
            .iter()
            .find(|item| item.review.as_ref().is_some_and(|r| r.len() > max))
        {
            return Err(AppError::Validation(format!(
                "review of task {} exceeds {max} bytes",
                item.task_id
            )));
        }
        let mut seen = HashSet::new();
        for item in ballot {
            if !seen.insert(item.task_id.as_str()) {
                return Err(AppError::InvalidAction(format!(
                    "task {} appears more than once in the ballot",
                    item.task_id
                )));
            }
        }
        Ok(())
    }
}

/// A ranking ballot must name exactly the open tasks, or exactly the
/// completed ones. Tasks on disqualified round entries are in neither set.
fn check_full_ballot(
    submitted: &[String],
    open: &[task::Model],
    completed: &[task::Model],
    disqualified: &HashSet<&str>,
) -> AppResult<()> {
    let ids = |tasks: &[task::Model]| -> HashSet<String> {
        tasks
            .iter()
            .filter(|t| !disqualified.contains(t.round_entry_id.as_str()))
            .map(|t| t.id.clone())
            .collect()
    };
    let submitted: HashSet<String> = submitted.iter().cloned().collect();
    let open_ids = ids(open);
    let completed_ids = ids(completed);

    if (!open_ids.is_empty() && submitted == open_ids)
        || (!completed_ids.is_empty() && submitted == completed_ids)
    {
        return Ok(());
    }
    Err(AppError::InvalidAction(format!(
        "a ranking ballot must rank all {} open tasks, or all {} completed tasks to edit",
        open_ids.len(),
        completed_ids.len()
    )))
}

async fn entries_by_round_entry<C: ConnectionTrait>(
    db: &C,
    round_entry_ids: &[String],
) -> AppResult<HashMap<String, entry::Model>> {
    let mut ids = round_entry_ids.to_vec();
    ids.sort();
    ids.dedup();
    Ok(RoundEntryRepository::new(db)
        .find_with_entries_by_ids(&ids)
        .await?
        .into_iter()
        .map(|(round_entry, entry)| (round_entry.id, entry))
        .collect())
}

fn missing_entry(round_entry_id: &str) -> AppError {
    AppError::Internal(format!("round entry {round_entry_id} has no entry"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_task(id: &str, completed: bool) -> task::Model {
        task::Model {
            id: id.to_string(),
            round_id: "r1".to_string(),
            round_entry_id: format!("re-{id}"),
            user_id: "alice".to_string(),
            created_at: Utc::now().into(),
            complete_date: completed.then(|| Utc::now().into()),
            cancel_date: None,
            skipped_at: None,
        }
    }

    fn service(max_review_bytes: usize) -> BallotService {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        BallotService::new(
            Arc::new(db),
            RoundsConfig {
                max_review_bytes,
                ..RoundsConfig::default()
            },
            IdGenerator::new(),
        )
    }

    fn item(task_id: &str, review: Option<&str>) -> BallotItem {
        BallotItem {
            task_id: task_id.to_string(),
            value: 1.0,
            review: review.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_empty_ballot_rejected() {
        let result = service(8192)
            .submit(&Actor::new("alice"), "r1", vec![])
            .await;
        assert!(matches!(result, Err(AppError::InvalidAction(_))));
    }

    #[tokio::test]
    async fn test_long_review_rejected_before_store_access() {
        let result = service(4)
            .submit(&Actor::new("alice"), "r1", vec![item("t1", Some("too long"))])
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_task_ids_rejected() {
        let result = service(8192)
            .submit(
                &Actor::new("alice"),
                "r1",
                vec![item("t1", None), item("t1", Some("again"))],
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidAction(_))));
    }

    #[test]
    fn test_full_ballot_matches_open_set() {
        let open = vec![create_test_task("t1", false), create_test_task("t2", false)];
        let submitted = vec!["t2".to_string(), "t1".to_string()];
        assert!(check_full_ballot(&submitted, &open, &[], &HashSet::new()).is_ok());
    }

    #[test]
    fn test_full_ballot_matches_completed_set() {
        let completed = vec![create_test_task("t1", true), create_test_task("t2", true)];
        let submitted = vec!["t1".to_string(), "t2".to_string()];
        assert!(check_full_ballot(&submitted, &[], &completed, &HashSet::new()).is_ok());
    }

    #[test]
    fn test_partial_or_mixed_ballot_rejected() {
        let open = vec![create_test_task("t1", false), create_test_task("t2", false)];
        let completed = vec![create_test_task("t3", true)];

        let partial = vec!["t1".to_string()];
        assert!(matches!(
            check_full_ballot(&partial, &open, &completed, &HashSet::new()),
            Err(AppError::InvalidAction(_))
        ));

        let mixed = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        assert!(matches!(
            check_full_ballot(&mixed, &open, &completed, &HashSet::new()),
            Err(AppError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_full_ballot_edit_skips_disqualified_entries() {
        let completed = vec![
            create_test_task("t1", true),
            create_test_task("t2", true),
            create_test_task("t3", true),
        ];
        let disqualified: HashSet<&str> = ["re-t2"].into_iter().collect();

        let remaining = vec!["t3".to_string(), "t1".to_string()];
        assert!(check_full_ballot(&remaining, &[], &completed, &disqualified).is_ok());

        let all = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        assert!(matches!(
            check_full_ballot(&all, &[], &completed, &disqualified),
            Err(AppError::InvalidAction(_))
        ));
    }
}
