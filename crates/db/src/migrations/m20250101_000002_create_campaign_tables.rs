//! Create campaign and campaign coordinator tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Campaign::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaign::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaign::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Campaign::OpenDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Campaign::CloseDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Campaign::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Campaign::ActiveRoundId).string_len(32))
                    .col(
                        ColumnDef::new(Campaign::CreatedAt)
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
                    .table(CampaignCoord::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignCoord::CampaignId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CampaignCoord::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(CampaignCoord::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(CampaignCoord::CampaignId)
                            .col(CampaignCoord::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_coord_campaign")
                            .from(CampaignCoord::Table, CampaignCoord::CampaignId)
                            .to(Campaign::Table, Campaign::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_coord_user")
                            .from(CampaignCoord::Table, CampaignCoord::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampaignCoord::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Campaign::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Campaign {
    Table,
    Id,
    Name,
    OpenDate,
    CloseDate,
    Status,
    ActiveRoundId,
    CreatedAt,
}

#[derive(Iden)]
enum CampaignCoord {
    Table,
    CampaignId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
