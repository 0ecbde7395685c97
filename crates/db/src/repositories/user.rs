//! User repository.

use crate::{
    db_err,
    entities::{User, user},
};
use jury_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

/// User repository for database operations.
pub struct UserRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Get a user by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DoesNotExist(format!("user {id}")))
    }

    /// Find users by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        User::find()
            .filter(user::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await
            .map_err(db_err)
    }

    /// Find users by usernames. Used to match entry uploaders to roles.
    pub async fn find_by_usernames(&self, usernames: &[String]) -> AppResult<Vec<user::Model>> {
        if usernames.is_empty() {
            return Ok(vec![]);
        }
        User::find()
            .filter(user::Column::Username.is_in(usernames.iter().map(String::as_str)))
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.update(self.db).await.map_err(db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            is_organizer: false,
            is_maintainer: false,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let repo = UserRepository::new(&db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::DoesNotExist(_))));
    }

    #[tokio::test]
    async fn test_find_by_username() {
        let user = create_test_user("u1", "Slaporte");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user.clone()]])
            .into_connection();

        let repo = UserRepository::new(&db);
        let found = repo.find_by_username("Slaporte").await.unwrap();

        assert_eq!(found.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let repo = UserRepository::new(&db);
        let users = repo.find_by_ids(&[]).await.unwrap();

        assert!(users.is_empty());
        assert!(db.into_transaction_log().is_empty());
    }
}
