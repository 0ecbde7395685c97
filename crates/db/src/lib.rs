//! Entity store for jury-rs.
//!
//! Entities, migrations and repositories for campaigns, rounds, entries,
//! tasks, votes and flags. Repositories borrow any [`ConnectionTrait`]
//! implementation, so the same query code runs against the pool or inside a
//! [`sea_orm::DatabaseTransaction`].

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use jury_common::{AppError, Config};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt).await.map_err(db_err)
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None).await.map_err(db_err)
}

/// Map a store error to [`AppError::Database`].
#[allow(clippy::needless_pass_by_value)]
pub fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Whether the connection supports `SELECT ... FOR UPDATE`.
pub fn supports_row_locks<C: ConnectionTrait>(db: &C) -> bool {
    !matches!(db.get_database_backend(), sea_orm::DatabaseBackend::Sqlite)
}
