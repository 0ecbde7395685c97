//! Flag repository.

use crate::{
    db_err,
    entities::{Flag, flag},
};
use jury_common::AppResult;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

/// Flag repository for database operations.
pub struct FlagRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> FlagRepository<'a, C> {
    /// Create a new flag repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a flag.
    pub async fn create(&self, model: flag::ActiveModel) -> AppResult<flag::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Get the flags raised in a round, oldest first.
    pub async fn find_by_round(&self, round_id: &str) -> AppResult<Vec<flag::Model>> {
        Flag::find()
            .filter(flag::Column::RoundId.eq(round_id))
            .order_by_asc(flag::Column::Id)
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
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_round() {
        let flag = flag::Model {
            id: "f1".to_string(),
            round_id: "r1".to_string(),
            round_entry_id: "re1".to_string(),
            user_id: "alice".to_string(),
            reason: Some("watermark".to_string()),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[flag.clone()]])
            .into_connection();

        let repo = FlagRepository::new(&db);
        let flags = repo.find_by_round("r1").await.unwrap();

        assert_eq!(flags, vec![flag]);
    }
}
