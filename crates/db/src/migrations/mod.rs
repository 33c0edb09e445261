//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_workspace_settings_table;
mod m20250101_000002_create_post_table;
mod m20250101_000003_create_post_schedule_table;
mod m20250101_000004_create_social_account_table;
mod m20250101_000005_create_usage_log_table;
mod m20250101_000006_create_activity_log_table;
mod m20250102_000001_add_post_schedule_claimed_by;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_workspace_settings_table::Migration),
            Box::new(m20250101_000002_create_post_table::Migration),
            Box::new(m20250101_000003_create_post_schedule_table::Migration),
            Box::new(m20250101_000004_create_social_account_table::Migration),
            Box::new(m20250101_000005_create_usage_log_table::Migration),
            Box::new(m20250101_000006_create_activity_log_table::Migration),
            Box::new(m20250102_000001_add_post_schedule_claimed_by::Migration),
        ]
    }
}
