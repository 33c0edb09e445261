//! Create `usage_log` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageLog::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(UsageLog::Resource).string_len(32).not_null())
                    .col(
                        ColumnDef::new(UsageLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Window counts filter on (user_id, resource, created_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_usage_log_user_resource_created_at")
                    .table(UsageLog::Table)
                    .col(UsageLog::UserId)
                    .col(UsageLog::Resource)
                    .col(UsageLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UsageLog {
    Table,
    Id,
    UserId,
    Resource,
    CreatedAt,
}
