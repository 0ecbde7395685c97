//! Campaign repository.

use crate::{
    db_err,
    entities::{Campaign, CampaignCoord, campaign, campaign_coord},
};
use jury_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Campaign repository for database operations.
pub struct CampaignRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> CampaignRepository<'a, C> {
    /// Create a new campaign repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a campaign by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<campaign::Model>> {
        Campaign::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Get a campaign by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<campaign::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DoesNotExist(format!("campaign {id}")))
    }

    /// Create a new campaign.
    pub async fn create(&self, model: campaign::ActiveModel) -> AppResult<campaign::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Update a campaign.
    pub async fn update(&self, model: campaign::ActiveModel) -> AppResult<campaign::Model> {
        model.update(self.db).await.map_err(db_err)
    }

    /// Check if a user coordinates a campaign.
    pub async fn is_coordinator(&self, campaign_id: &str, user_id: &str) -> AppResult<bool> {
        let count = CampaignCoord::find()
            .filter(campaign_coord::Column::CampaignId.eq(campaign_id))
            .filter(campaign_coord::Column::UserId.eq(user_id))
            .count(self.db)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Add a coordinator to a campaign.
    pub async fn add_coordinator(
        &self,
        model: campaign_coord::ActiveModel,
    ) -> AppResult<campaign_coord::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Get the user IDs of a campaign's coordinators.
    pub async fn find_coordinator_ids(&self, campaign_id: &str) -> AppResult<Vec<String>> {
        let coords = CampaignCoord::find()
            .filter(campaign_coord::Column::CampaignId.eq(campaign_id))
            .order_by_asc(campaign_coord::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(db_err)?;
        Ok(coords.into_iter().map(|c| c.user_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_coord(campaign_id: &str, user_id: &str) -> campaign_coord::Model {
        campaign_coord::Model {
            campaign_id: campaign_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_is_coordinator() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(1))
            }]])
            .into_connection();

        let repo = CampaignRepository::new(&db);
        assert!(repo.is_coordinator("c1", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_coordinator_ids() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_coord("c1", "u1"),
                create_test_coord("c1", "u2"),
            ]])
            .into_connection();

        let repo = CampaignRepository::new(&db);
        let ids = repo.find_coordinator_ids("c1").await.unwrap();

        assert_eq!(ids, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<campaign::Model>::new()])
            .into_connection();

        let repo = CampaignRepository::new(&db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::DoesNotExist(_))));
    }
}
