//! Entry and round entry repositories.

use crate::{
    db_err,
    entities::{Entry, RoundEntry, entry, round_entry},
};
use jury_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Entry repository for database operations.
pub struct EntryRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> EntryRepository<'a, C> {
    /// Create a new entry repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find an entry by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<entry::Model>> {
        Entry::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Find entries by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<entry::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Entry::find()
            .filter(entry::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Find entries by file name.
    pub async fn find_by_names(&self, names: &[String]) -> AppResult<Vec<entry::Model>> {
        if names.is_empty() {
            return Ok(vec![]);
        }
        Entry::find()
            .filter(entry::Column::Name.is_in(names.iter().map(String::as_str)))
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Create a new entry.
    pub async fn create(&self, model: entry::ActiveModel) -> AppResult<entry::Model> {
        model.insert(self.db).await.map_err(db_err)
    }
}

/// Round entry repository for database operations.
pub struct RoundEntryRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RoundEntryRepository<'a, C> {
    /// Create a new round entry repository.
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Find a round entry by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<round_entry::Model>> {
        RoundEntry::find_by_id(id).one(self.db).await.map_err(db_err)
    }

    /// Get the membership of an entry in a round.
    pub async fn get_by_round_and_entry(
        &self,
        round_id: &str,
        entry_id: &str,
    ) -> AppResult<round_entry::Model> {
        RoundEntry::find()
            .filter(round_entry::Column::RoundId.eq(round_id))
            .filter(round_entry::Column::EntryId.eq(entry_id))
            .one(self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::DoesNotExist(format!("entry {entry_id} in round {round_id}")))
    }

    /// Get every round entry of a round, disqualified or not.
    pub async fn find_by_round(&self, round_id: &str) -> AppResult<Vec<round_entry::Model>> {
        RoundEntry::find()
            .filter(round_entry::Column::RoundId.eq(round_id))
            .order_by_asc(round_entry::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get the round entries that are not disqualified.
    pub async fn find_eligible_by_round(
        &self,
        round_id: &str,
    ) -> AppResult<Vec<round_entry::Model>> {
        RoundEntry::find()
            .filter(round_entry::Column::RoundId.eq(round_id))
            .filter(round_entry::Column::DqDate.is_null())
            .order_by_asc(round_entry::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)
    }

    /// Get the round entries of a round together with their entries.
    pub async fn find_with_entries_by_round(
        &self,
        round_id: &str,
    ) -> AppResult<Vec<(round_entry::Model, entry::Model)>> {
        let rows = RoundEntry::find()
            .find_also_related(Entry)
            .filter(round_entry::Column::RoundId.eq(round_id))
            .order_by_asc(round_entry::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)?;

        pair_with_entries(rows)
    }

    /// Get the given round entries together with their entries.
    pub async fn find_with_entries_by_ids(
        &self,
        ids: &[String],
    ) -> AppResult<Vec<(round_entry::Model, entry::Model)>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = RoundEntry::find()
            .find_also_related(Entry)
            .filter(round_entry::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_asc(round_entry::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)?;

        pair_with_entries(rows)
    }

    /// Count the round entries of a round.
    pub async fn count_by_round(&self, round_id: &str) -> AppResult<u64> {
        RoundEntry::find()
            .filter(round_entry::Column::RoundId.eq(round_id))
            .count(self.db)
            .await
            .map_err(db_err)
    }

    /// Count the disqualified round entries of a round.
    pub async fn count_disqualified_by_round(&self, round_id: &str) -> AppResult<u64> {
        RoundEntry::find()
            .filter(round_entry::Column::RoundId.eq(round_id))
            .filter(round_entry::Column::DqDate.is_not_null())
            .count(self.db)
            .await
            .map_err(db_err)
    }

    /// Create a round entry.
    pub async fn create(&self, model: round_entry::ActiveModel) -> AppResult<round_entry::Model> {
        model.insert(self.db).await.map_err(db_err)
    }

    /// Update a round entry.
    pub async fn update(&self, model: round_entry::ActiveModel) -> AppResult<round_entry::Model> {
        model.update(self.db).await.map_err(db_err)
    }
}

fn pair_with_entries(
    rows: Vec<(round_entry::Model, Option<entry::Model>)>,
) -> AppResult<Vec<(round_entry::Model, entry::Model)>> {
    rows.into_iter()
        .map(|(round_entry, entry)| match entry {
            Some(entry) => Ok((round_entry, entry)),
            None => Err(AppError::Internal(format!(
                "round entry {} references a missing entry",
                round_entry.id
            ))),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_entry(id: &str, name: &str) -> entry::Model {
        entry::Model {
            id: id.to_string(),
            name: name.to_string(),
            width: 4000,
            height: 3000,
            mime_type: "image/jpeg".to_string(),
            upload_user_text: "Alice".to_string(),
            upload_date: None,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_round_entry(id: &str, entry_id: &str) -> round_entry::Model {
        round_entry::Model {
            id: id.to_string(),
            round_id: "r1".to_string(),
            entry_id: entry_id.to_string(),
            dq_reason: None,
            dq_user_id: None,
            dq_date: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_names() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![create_test_entry("e1", "Sunset.jpg")]])
            .into_connection();

        let repo = EntryRepository::new(&db);
        let entries = repo
            .find_by_names(&["Sunset.jpg".to_string()])
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resolution(), 12_000_000);
    }

    #[tokio::test]
    async fn test_get_by_round_and_entry_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<round_entry::Model>::new()])
            .into_connection();

        let repo = RoundEntryRepository::new(&db);
        let result = repo.get_by_round_and_entry("r1", "e9").await;

        assert!(matches!(result, Err(AppError::DoesNotExist(_))));
    }

    #[tokio::test]
    async fn test_find_eligible_by_round() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                create_test_round_entry("re1", "e1"),
                create_test_round_entry("re2", "e2"),
            ]])
            .into_connection();

        let repo = RoundEntryRepository::new(&db);
        let round_entries = repo.find_eligible_by_round("r1").await.unwrap();

        assert_eq!(round_entries.len(), 2);
        assert!(round_entries.iter().all(|re| !re.is_disqualified()));
    }

    #[tokio::test]
    async fn test_count_disqualified_by_round() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(3))
            }]])
            .into_connection();

        let repo = RoundEntryRepository::new(&db);
        assert_eq!(repo.count_disqualified_by_round("r1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_find_with_entries_by_no_ids_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let repo = RoundEntryRepository::new(&db);
        let pairs = repo.find_with_entries_by_ids(&[]).await.unwrap();

        assert!(pairs.is_empty());
        assert!(db.into_transaction_log().is_empty());
    }
}
