//! Task repository.
//!
//! Tasks are never deleted. Cancelling sets `cancel_date`, completing sets
//! `complete_date`; both bulk updates only touch rows that are still active.

use crate::{
    db_err,
    entities::{Task, task},
};
use jury_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};

/// Rows per bulk statement, well under the bind parameter limits.
pub const BATCH_SIZE: usize = 1000;

/// Task repository for database operations.
pub struct TaskRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TaskRepository<'a, C> {
    /// Create a new task repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a task by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<task::Model>> {
        Task::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Get a task by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<task::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DoesNotExist(format!("task {id}")))
    }

    /// Find tasks by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<task::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Task::find()
            .filter(task::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get the active (not cancelled) tasks of a round, oldest first.
    pub async fn find_active_by_round(&self, round_id: &str) -> AppResult<Vec<task::Model>> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_null())
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get a juror's open tasks in a round, oldest first.
    pub async fn find_open_by_juror(
        &self,
        round_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<task::Model>> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::UserId.eq(user_id))
            .filter(task::Column::CancelDate.is_null())
            .filter(task::Column::CompleteDate.is_null())
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get a juror's completed, still active tasks in a round.
    pub async fn find_completed_by_juror(
        &self,
        round_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<task::Model>> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::UserId.eq(user_id))
            .filter(task::Column::CancelDate.is_null())
            .filter(task::Column::CompleteDate.is_not_null())
            .order_by_asc(task::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Insert tasks, [`BATCH_SIZE`] rows per statement.
    pub async fn create_many(&self, models: Vec<task::ActiveModel>) -> AppResult<u64> {
        let count = models.len() as u64;
        let mut models = models.into_iter().peekable();
        while models.peek().is_some() {
            let batch: Vec<task::ActiveModel> = models.by_ref().take(BATCH_SIZE).collect();
            Task::insert_many(batch)
                .exec_without_returning(self.db)
                .await
                .map_err(db_err)?;
        }
        Ok(count)
    }

    /// Cancel the given tasks if they are still active. Returns the number
    /// of tasks cancelled.
    pub async fn cancel(&self, ids: &[String], now: DateTimeWithTimeZone) -> AppResult<u64> {
        let mut cancelled = 0;
        for batch in ids.chunks(BATCH_SIZE) {
            let result = Task::update_many()
                .col_expr(task::Column::CancelDate, Expr::value(now))
                .filter(task::Column::Id.is_in(batch.iter().map(String::as_str)))
                .filter(task::Column::CancelDate.is_null())
                .exec(self.db)
                .await
                .map_err(db_err)?;
            cancelled += result.rows_affected;
        }
        Ok(cancelled)
    }

    /// Cancel the open tasks of a round entry. Completed tasks are kept.
    pub async fn cancel_open_by_round_entry(
        &self,
        round_entry_id: &str,
        now: DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        let result = Task::update_many()
            .col_expr(task::Column::CancelDate, Expr::value(now))
            .filter(task::Column::RoundEntryId.eq(round_entry_id))
            .filter(task::Column::CancelDate.is_null())
            .filter(task::Column::CompleteDate.is_null())
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Cancel every active task of a round, completed ones included.
    pub async fn cancel_active_by_round(
        &self,
        round_id: &str,
        now: DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        let result = Task::update_many()
            .col_expr(task::Column::CancelDate, Expr::value(now))
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_null())
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Mark tasks complete. The first completion date is kept on edits.
    pub async fn complete(&self, ids: &[String], now: DateTimeWithTimeZone) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = Task::update_many()
            .col_expr(task::Column::CompleteDate, Expr::value(now))
            .filter(task::Column::Id.is_in(ids.iter().map(String::as_str)))
            .filter(task::Column::CancelDate.is_null())
            .filter(task::Column::CompleteDate.is_null())
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    /// Record that a juror skipped an open task.
    pub async fn mark_skipped(&self, id: &str, now: DateTimeWithTimeZone) -> AppResult<()> {
        Task::update_many()
            .col_expr(task::Column::SkippedAt, Expr::value(now))
            .filter(task::Column::Id.eq(id))
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Count the active tasks of a round.
    pub async fn count_active_by_round(&self, round_id: &str) -> AppResult<u64> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_null())
            .count(self.db)
            .await
            .map_err(db_err)
    }

    /// Count the open tasks of a round.
    pub async fn count_open_by_round(&self, round_id: &str) -> AppResult<u64> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_null())
            .filter(task::Column::CompleteDate.is_null())
            .count(self.db)
            .await
            .map_err(db_err)
    }

    /// Count the cancelled tasks of a round.
    pub async fn count_cancelled_by_round(&self, round_id: &str) -> AppResult<u64> {
        Task::find()
            .filter(task::Column::RoundId.eq(round_id))
            .filter(task::Column::CancelDate.is_not_null())
            .count(self.db)
            .await
            .map_err(db_err)
    }
}
