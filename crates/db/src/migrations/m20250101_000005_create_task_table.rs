//! Create task table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Task::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Task::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Task::RoundId).string_len(32).not_null())
                    .col(ColumnDef::new(Task::RoundEntryId).string_len(32).not_null())
                    .col(ColumnDef::new(Task::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Task::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Task::CompleteDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Task::CancelDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Task::SkippedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_round")
                            .from(Task::Table, Task::RoundId)
                            .to(Round::Table, Round::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_round_entry")
                            .from(Task::Table, Task::RoundEntryId)
                            .to(RoundEntry::Table, RoundEntry::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_user")
                            .from(Task::Table, Task::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_task_round_id")
                    .table(Task::Table)
                    .col(Task::RoundId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_task_round_entry_id")
                    .table(Task::Table)
                    .col(Task::RoundEntryId)
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, round_id) for a juror's queue
        manager
            .create_index(
                Index::create()
                    .name("idx_task_user_round")
                    .table(Task::Table)
                    .col(Task::UserId)
                    .col(Task::RoundId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Task::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Task {
    Table,
    Id,
    RoundId,
    RoundEntryId,
    UserId,
    CreatedAt,
    CompleteDate,
    CancelDate,
    SkippedAt,
}

#[derive(Iden)]
enum Round {
    Table,
    Id,
}

#[derive(Iden)]
enum RoundEntry {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
