//! Create entry and round entry tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Entry::Name)
                            .string_len(512)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Entry::Width).integer().not_null())
                    .col(ColumnDef::new(Entry::Height).integer().not_null())
                    .col(ColumnDef::new(Entry::MimeType).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Entry::UploadUserText)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Entry::UploadDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Entry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoundEntry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoundEntry::RoundId).string_len(32).not_null())
                    .col(ColumnDef::new(RoundEntry::EntryId).string_len(32).not_null())
                    .col(ColumnDef::new(RoundEntry::DqReason).text())
                    .col(ColumnDef::new(RoundEntry::DqUserId).string_len(32))
                    .col(ColumnDef::new(RoundEntry::DqDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(RoundEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_entry_round")
                            .from(RoundEntry::Table, RoundEntry::RoundId)
                            .to(Round::Table, Round::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_entry_entry")
                            .from(RoundEntry::Table, RoundEntry::EntryId)
                            .to(Entry::Table, Entry::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (round_id, entry_id) - an entry appears once per round
        manager
            .create_index(
                Index::create()
                    .name("idx_round_entry_round_entry")
                    .table(RoundEntry::Table)
                    .col(RoundEntry::RoundId)
                    .col(RoundEntry::EntryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoundEntry::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Entry {
    Table,
    Id,
    Name,
    Width,
    Height,
    MimeType,
    UploadUserText,
    UploadDate,
    CreatedAt,
}

#[derive(Iden)]
enum RoundEntry {
    Table,
    Id,
    RoundId,
    EntryId,
    DqReason,
    DqUserId,
    DqDate,
    CreatedAt,
}

#[derive(Iden)]
enum Round {
    Table,
    Id,
}
