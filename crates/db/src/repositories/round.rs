//! Round repository.

use crate::{
    db_err,
    entities::{
        Round,
        round::{self, RoundStatus},
    },
    supports_row_locks,
};
use jury_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Round repository for database operations.
pub struct RoundRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RoundRepository<'a, C> {
    /// Create a new round repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a round by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<round::Model>> {
        Round::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Get a round by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<round::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DoesNotExist(format!("round {id}")))
    }

    /// Get a round by ID and hold an exclusive lock on its row until the
    /// enclosing transaction ends.
    ///
    /// Every operation that reads and then rewrites a round's task set goes
    /// through this, so those operations serialize per round.
    pub async fn get_for_update(&self, id: &str) -> AppResult<round::Model> {
        let mut query = Round::find_by_id(id);
        if supports_row_locks(self.db) {
            query = query.lock_exclusive();
        }
        query
            .one(self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::DoesNotExist(format!("round {id}")))
    }

    /// Create a new round.
    pub async fn create(&self, model: round::ActiveModel) -> AppResult<round::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Update a round.
    pub async fn update(&self, model: round::ActiveModel) -> AppResult<round::Model> {
        model.update(self.db).await.map_err(db_err)
    }

    /// Get all rounds of a campaign in creation order.
    pub async fn find_by_campaign(&self, campaign_id: &str) -> AppResult<Vec<round::Model>> {
        Round::find()
            .filter(round::Column::CampaignId.eq(campaign_id))
            .order_by_asc(round::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Find rounds of a campaign that are active or paused, other than
    /// `except_round_id`.
    pub async fn find_in_progress_by_campaign(
        &self,
        campaign_id: &str,
        except_round_id: &str,
    ) -> AppResult<Vec<round::Model>> {
        Round::find()
            .filter(round::Column::CampaignId.eq(campaign_id))
            .filter(round::Column::Id.ne(except_round_id))
            .filter(round::Column::Status.is_in([RoundStatus::Active, RoundStatus::Paused]))
            .all(self.db)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::round::VoteMethod;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_round(id: &str, status: RoundStatus) -> round::Model {
        round::Model {
            id: id.to_string(),
            campaign_id: "c1".to_string(),
            name: "Round 1".to_string(),
            directions: None,
            vote_method: VoteMethod::Rating,
            quorum: 2,
            status,
            deadline: None,
            config: serde_json::json!({}),
            rebalance_pending: false,
            final_threshold: None,
            created_at: Utc::now().into(),
            activated_at: None,
            closed_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_for_update_locks_row_on_postgres() {
        let round = create_test_round("r1", RoundStatus::Active);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[round.clone()]])
            .into_connection();

        let repo = RoundRepository::new(&db);
        let found = repo.get_for_update("r1").await.unwrap();
        assert_eq!(found.id, "r1");

        let log = db.into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_get_for_update_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<round::Model>::new()])
            .into_connection();

        let repo = RoundRepository::new(&db);
        let result = repo.get_for_update("missing").await;

        assert!(matches!(result, Err(AppError::DoesNotExist(_))));
    }

    #[tokio::test]
    async fn test_find_in_progress_by_campaign() {
        let paused = create_test_round("r2", RoundStatus::Paused);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[paused.clone()]])
            .into_connection();

        let repo = RoundRepository::new(&db);
        let rounds = repo.find_in_progress_by_campaign("c1", "r1").await.unwrap();

        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].status, RoundStatus::Paused);
    }
}
