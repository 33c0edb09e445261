//! Create `post_schedule` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostSchedule::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostSchedule::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostSchedule::PostId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PostSchedule::SocialAccountId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostSchedule::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostSchedule::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PostSchedule::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PostSchedule::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PostSchedule::ExternalPostId).string_len(256))
                    .col(ColumnDef::new(PostSchedule::ErrorMessage).text())
                    .col(
                        ColumnDef::new(PostSchedule::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PostSchedule::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_schedule_post")
                            .from(PostSchedule::Table, PostSchedule::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_schedule_post_id")
                    .table(PostSchedule::Table)
                    .col(PostSchedule::PostId)
                    .to_owned(),
            )
            .await?;

        // Composite index for the due-schedule claim
        manager
            .create_index(
                Index::create()
                    .name("idx_post_schedule_status_scheduled_at")
                    .table(PostSchedule::Table)
                    .col(PostSchedule::Status)
                    .col(PostSchedule::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostSchedule::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostSchedule {
    Table,
    Id,
    PostId,
    SocialAccountId,
    ScheduledAt,
    Status,
    RetryCount,
    PublishedAt,
    ExternalPostId,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}
