//! Round juror repository.

use crate::{
    db_err,
    entities::{RoundJuror, round_juror},
};
use jury_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Round juror repository for database operations.
pub struct RoundJurorRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RoundJurorRepository<'a, C> {
    /// Create a new round juror repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Get every juror row of a round, active or not.
    pub async fn find_by_round(&self, round_id: &str) -> AppResult<Vec<round_juror::Model>> {
        RoundJuror::find()
            .filter(round_juror::Column::RoundId.eq(round_id))
            .order_by_asc(round_juror::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get the active jurors of a round.
    pub async fn find_active_by_round(
        &self,
        round_id: &str,
    ) -> AppResult<Vec<round_juror::Model>> {
        RoundJuror::find()
            .filter(round_juror::Column::RoundId.eq(round_id))
            .filter(round_juror::Column::IsActive.eq(true))
            .order_by_asc(round_juror::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Find the juror row for a user in a round.
    pub async fn find_by_round_and_user(
        &self,
        round_id: &str,
        user_id: &str,
    ) -> AppResult<Option<round_juror::Model>> {
        RoundJuror::find()
            .filter(round_juror::Column::RoundId.eq(round_id))
            .filter(round_juror::Column::UserId.eq(user_id))
            .one(self.db)
            .await
            .map_err(db_err)
    }

    /// Check if a user is an active juror of a round.
    pub async fn is_active_juror(&self, round_id: &str, user_id: &str) -> AppResult<bool> {
        let count = RoundJuror::find()
            .filter(round_juror::Column::RoundId.eq(round_id))
            .filter(round_juror::Column::UserId.eq(user_id))
            .filter(round_juror::Column::IsActive.eq(true))
            .count(self.db)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Count the active jurors of a round.
    pub async fn count_active_by_round(&self, round_id: &str) -> AppResult<u64> {
        RoundJuror::find()
            .filter(round_juror::Column::RoundId.eq(round_id))
            .filter(round_juror::Column::IsActive.eq(true))
            .count(self.db)
            .await
            .map_err(db_err)
    }

    /// Create a juror row.
    pub async fn create(&self, model: round_juror::ActiveModel) -> AppResult<round_juror::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Update a juror row.
    pub async fn update(&self, model: round_juror::ActiveModel) -> AppResult<round_juror::Model> {
        model.update(self.db).await.map_err(db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_juror(id: &str, user_id: &str, is_active: bool) -> round_juror::Model {
        round_juror::Model {
            id: id.to_string(),
            round_id: "r1".to_string(),
            user_id: user_id.to_string(),
            is_active,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_active_by_round() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_juror("j1", "alice", true),
                create_test_juror("j2", "bob", true),
            ]])
            .into_connection();

        let repo = RoundJurorRepository::new(&db);
        let jurors = repo.find_active_by_round("r1").await.unwrap();

        assert_eq!(jurors.len(), 2);
        assert!(jurors.iter().all(|j| j.is_active));
    }

    #[tokio::test]
    async fn test_is_active_juror_false() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(0))
            }]])
            .into_connection();

        let repo = RoundJurorRepository::new(&db);
        assert!(!repo.is_active_juror("r1", "mallory").await.unwrap());
    }
}
