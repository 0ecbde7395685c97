//! Vote repository.

use crate::{
    db_err,
    entities::{Vote, task, vote},
};
use jury_common::AppResult;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, sea_query::OnConflict,
};

/// Vote repository for database operations.
pub struct VoteRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> VoteRepository<'a, C> {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert a vote, or overwrite the value and review of the vote already
    /// recorded for the same task.
    pub async fn upsert(&self, model: vote::ActiveModel) -> AppResult<()> {
        Vote::insert(model)
            .on_conflict(
                OnConflict::column(vote::Column::TaskId)
                    .update_columns([
                        vote::Column::Value,
                        vote::Column::Review,
                        vote::Column::ModifiedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Find the votes recorded for the given tasks.
    pub async fn find_by_task_ids(&self, task_ids: &[String]) -> AppResult<Vec<vote::Model>> {
        if task_ids.is_empty() {
            return Ok(vec![]);
        }
        Vote::find()
            .filter(vote::Column::TaskId.is_in(task_ids.iter().map(String::as_str)))
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get the votes of a round that still count: their task is not
    /// cancelled.
    pub async fn find_counted_by_round(&self, round_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .join(JoinType::InnerJoin, vote::Relation::Task.def())
            .filter(vote::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_null())
            .order_by_asc(vote::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get a juror's counted votes in a round.
    pub async fn find_counted_by_juror(
        &self,
        round_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .join(JoinType::InnerJoin, vote::Relation::Task.def())
            .filter(vote::Column::RoundId.eq(round_id))
            .filter(vote::Column::UserId.eq(user_id))
            .filter(task::Column::CancelDate.is_null())
            .order_by_asc(vote::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_vote(id: &str, task_id: &str, value: f64) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            task_id: task_id.to_string(),
            round_id: "r1".to_string(),
            round_entry_id: "re1".to_string(),
            user_id: "alice".to_string(),
            value,
            review: None,
            created_at: Utc::now().into(),
            modified_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_targets_task_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let now = Utc::now();
        let repo = VoteRepository::new(&db);
        repo.upsert(vote::ActiveModel {
            id: Set("v1".to_string()),
            task_id: Set("t1".to_string()),
            round_id: Set("r1".to_string()),
            round_entry_id: Set("re1".to_string()),
            user_id: Set("alice".to_string()),
            value: Set(0.5),
            review: Set(None),
            created_at: Set(now.into()),
            modified_at: Set(now.into()),
        })
        .await
        .unwrap();

        let sql = format!("{:?}", db.into_transaction_log());
        assert!(sql.contains("ON CONFLICT"));
        assert!(sql.contains("task_id"));
    }

    #[tokio::test]
    async fn test_find_counted_by_round() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_vote("v1", "t1", 0.25),
                create_test_vote("v2", "t2", 1.0),
            ]])
            .into_connection();

        let repo = VoteRepository::new(&db);
        let votes = repo.find_counted_by_round("r1").await.unwrap();

        assert_eq!(votes.len(), 2);
        assert_eq!(votes[1].value, 1.0);
    }
}
