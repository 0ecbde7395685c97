//! Create flag table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Flag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Flag::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Flag::RoundId).string_len(32).not_null())
                    .col(ColumnDef::new(Flag::RoundEntryId).string_len(32).not_null())
                    .col(ColumnDef::new(Flag::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Flag::Reason).text())
                    .col(
                        ColumnDef::new(Flag::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_flag_round_entry")
                            .from(Flag::Table, Flag::RoundEntryId)
                            .to(RoundEntry::Table, RoundEntry::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_flag_round_id")
                    .table(Flag::Table)
                    .col(Flag::RoundId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Flag::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Flag {
    Table,
    Id,
    RoundId,
    RoundEntryId,
    UserId,
    Reason,
    CreatedAt,
}

#[derive(Iden)]
enum RoundEntry {
    Table,
    Id,
}
