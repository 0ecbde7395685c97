//! Create round and round juror tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Round::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Round::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Round::CampaignId).string_len(32).not_null())
                    .col(ColumnDef::new(Round::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Round::Directions).text())
                    .col(ColumnDef::new(Round::VoteMethod).string_len(16).not_null())
                    .col(ColumnDef::new(Round::Quorum).integer().not_null())
                    .col(
                        ColumnDef::new(Round::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Round::Deadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Round::Config).json().not_null())
                    .col(
                        ColumnDef::new(Round::RebalancePending)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Round::FinalThreshold).double())
                    .col(
                        ColumnDef::new(Round::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Round::ActivatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Round::ClosedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_campaign")
                            .from(Round::Table, Round::CampaignId)
                            .to(Campaign::Table, Campaign::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: campaign_id (for the at-most-one-active-round check)
        manager
            .create_index(
                Index::create()
                    .name("idx_round_campaign_id")
                    .table(Round::Table)
                    .col(Round::CampaignId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundJuror::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoundJuror::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoundJuror::RoundId).string_len(32).not_null())
                    .col(ColumnDef::new(RoundJuror::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(RoundJuror::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RoundJuror::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_juror_round")
                            .from(RoundJuror::Table, RoundJuror::RoundId)
                            .to(Round::Table, Round::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_juror_user")
                            .from(RoundJuror::Table, RoundJuror::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (round_id, user_id) - a juror joins a round once
        manager
            .create_index(
                Index::create()
                    .name("idx_round_juror_round_user")
                    .table(RoundJuror::Table)
                    .col(RoundJuror::RoundId)
                    .col(RoundJuror::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoundJuror::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Round::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Round {
    Table,
    Id,
    CampaignId,
    Name,
    Directions,
    VoteMethod,
    Quorum,
    Status,
    Deadline,
    Config,
    RebalancePending,
    FinalThreshold,
    CreatedAt,
    ActivatedAt,
    ClosedAt,
}

#[derive(Iden)]
enum RoundJuror {
    Table,
    Id,
    RoundId,
    UserId,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
enum Campaign {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
