//! Create `social_account` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialAccount::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialAccount::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SocialAccount::WorkspaceId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SocialAccount::Provider).string_len(32).not_null())
                    .col(
                        ColumnDef::new(SocialAccount::ProviderId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SocialAccount::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(SocialAccount::Status)
                            .string_len(16)
                            .not_null()
                            .default("connected"),
                    )
                    .col(ColumnDef::new(SocialAccount::TokenEncrypted).text())
                    .col(ColumnDef::new(SocialAccount::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(SocialAccount::Metadata)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(SocialAccount::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(SocialAccount::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_social_account_workspace_provider")
                    .table(SocialAccount::Table)
                    .col(SocialAccount::WorkspaceId)
                    .col(SocialAccount::Provider)
                    .to_owned(),
            )
            .await?;

        // One connection per provider account within a workspace
        manager
            .create_index(
                Index::create()
                    .name("idx_social_account_unique_provider_id")
                    .table(SocialAccount::Table)
                    .col(SocialAccount::WorkspaceId)
                    .col(SocialAccount::Provider)
                    .col(SocialAccount::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SocialAccount::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SocialAccount {
    Table,
    Id,
    WorkspaceId,
    Provider,
    ProviderId,
    Name,
    Status,
    TokenEncrypted,
    ExpiresAt,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
