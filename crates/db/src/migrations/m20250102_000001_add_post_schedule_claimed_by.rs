//! Add `claimed_by` to `post_schedule`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(PostSchedule::Table)
                    .add_column(ColumnDef::new(PostSchedule::ClaimedBy).string_len(64))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(PostSchedule::Table)
                    .drop_column(PostSchedule::ClaimedBy)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum PostSchedule {
    Table,
    ClaimedBy,
}
