//! Actors and role checks.

use jury_common::{AppError, AppResult};
use jury_db::{
    entities::user,
    repositories::{CampaignRepository, RoundJurorRepository, UserRepository},
};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    /// Create an actor for an authenticated user.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Load the actor's user record. Unknown users are not authenticated.
pub(crate) async fn load_actor<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> AppResult<user::Model> {
    UserRepository::new(db)
        .find_by_id(&actor.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Organizers and maintainers may create campaigns.
pub(crate) async fn require_organizer<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> AppResult<user::Model> {
    let user = load_actor(db, actor).await?;
    if user.is_organizer || user.is_maintainer {
        Ok(user)
    } else {
        Err(AppError::PermissionDenied(
            "only organizers can do this".to_string(),
        ))
    }
}

/// Only maintainers may grant the organizer role.
pub(crate) async fn require_maintainer<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> AppResult<user::Model> {
    let user = load_actor(db, actor).await?;
    if user.is_maintainer {
        Ok(user)
    } else {
        Err(AppError::PermissionDenied(
            "only maintainers can do this".to_string(),
        ))
    }
}

/// Campaign coordinators, organizers and maintainers administer rounds.
pub(crate) async fn require_coordinator<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    campaign_id: &str,
) -> AppResult<user::Model> {
    let user = load_actor(db, actor).await?;
    if user.is_organizer || user.is_maintainer {
        return Ok(user);
    }
    if CampaignRepository::new(db)
        .is_coordinator(campaign_id, &user.id)
        .await?
    {
        Ok(user)
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} does not coordinate campaign {campaign_id}",
            user.id
        )))
    }
}

/// Only active jurors of a round may vote, skip, flag or list tasks.
pub(crate) async fn require_juror<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    round_id: &str,
) -> AppResult<user::Model> {
    let user = load_actor(db, actor).await?;
    if RoundJurorRepository::new(db)
        .is_active_juror(round_id, &user.id)
        .await?
    {
        Ok(user)
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} is not a juror of round {round_id}",
            user.id
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(id: &str, is_organizer: bool) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            is_organizer,
            is_maintainer: false,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_unknown_actor_is_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let result = load_actor(&db, &Actor::new("ghost")).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_organizer_skips_coordinator_lookup() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("org", true)]])
            .into_connection();

        let user = require_coordinator(&db, &Actor::new("org"), "c1")
            .await
            .unwrap();
        assert_eq!(user.id, "org");
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_non_coordinator_denied() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("juror", false)]])
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(0))
            }]])
            .into_connection();

        let result = require_coordinator(&db, &Actor::new("juror"), "c1").await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_organizer_is_not_maintainer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("org", true)]])
            .into_connection();

        let result = require_maintainer(&db, &Actor::new("org")).await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }
}
